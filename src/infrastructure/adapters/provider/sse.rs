//! SSE 帧解析
//!
//! 字节块按到达顺序累积，只有遇到空行边界的完整事件块才会被取出，
//! 跨块截断的 UTF-8 与半帧由缓冲吸收。

/// SSE 接收缓冲
///
/// 内部以原始字节累积：网络块可能在多字节 UTF-8 字符中间断开，
/// 解码必须推迟到完整事件块取出之后。`\n\n` 的两个字节都不可能
/// 出现在多字节字符内部（续字节落在 0x80..=0xBF），所以字节级
/// 边界查找不会把字符切开。
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// 取出下一个完整事件块（以空行结尾），不完整则返回 None
    pub fn next_event_block(&mut self) -> Option<String> {
        let boundary = self.buffer.windows(2).position(|w| w == b"\n\n")?;
        let remaining = self.buffer.split_off(boundary + 2);
        let event_block = std::mem::replace(&mut self.buffer, remaining);
        Some(String::from_utf8_lossy(&event_block).into_owned())
    }
}

/// 提取事件块中的 data 行
pub fn parse_data_lines(event_block: &str) -> Vec<&str> {
    event_block
        .lines()
        .filter_map(|line| {
            line.strip_prefix("data: ")
                .or_else(|| line.strip_prefix("data:"))
        })
        .collect()
}

/// 提取 data 行并过滤 [DONE] 哨兵
pub fn parse_data_lines_without_done(event_block: &str) -> Vec<&str> {
    parse_data_lines(event_block)
        .into_iter()
        .filter(|data| data.trim() != "[DONE]")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_frames_only() {
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(b"data: first\n\npartial");

        assert_eq!(buffer.next_event_block().as_deref(), Some("data: first\n\n"));
        assert!(buffer.next_event_block().is_none());

        buffer.push_chunk(b"ly\n\n");
        assert_eq!(buffer.next_event_block().as_deref(), Some("partially\n\n"));
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        // "好" = E5 A5 BD，在第二个字节后断开
        let mut buffer = SseBuffer::new();
        buffer.push_chunk(b"data: \xE5\xA5");
        assert!(buffer.next_event_block().is_none());

        buffer.push_chunk(b"\xBD\n\n");
        let block = buffer.next_event_block().unwrap();
        assert_eq!(parse_data_lines(&block), vec!["好"]);
    }

    #[test]
    fn test_cjk_heading_split_mid_stream() {
        let mut buffer = SseBuffer::new();
        let payload = "data: 第3章：风起\n\n".as_bytes();
        // 逐字节喂入，模拟最坏的网络切分
        for byte in payload {
            buffer.push_chunk(std::slice::from_ref(byte));
        }
        let block = buffer.next_event_block().unwrap();
        assert_eq!(parse_data_lines(&block), vec!["第3章：风起"]);
    }

    #[test]
    fn test_data_lines_ignore_other_fields() {
        let block = "event: message\ndata: one\nretry: 100\ndata:two\n\n";
        assert_eq!(parse_data_lines(block), vec!["one", "two"]);
    }

    #[test]
    fn test_done_sentinel_filtered() {
        let block = "data: payload\ndata: [DONE]\n\n";
        assert_eq!(parse_data_lines_without_done(block), vec!["payload"]);
    }
}
