//! 大纲解析器
//!
//! 将模型自由输出修复为有序的章节节拍列表。
//!
//! 分层降级策略（纯函数链，返回带标签的结果）:
//! 1. 去除代码围栏，按括号深度截取第一个完整的 JSON 数组/对象
//!    （字符串内的括号不计深度，容忍结尾的模型附言）
//! 2. 清理非法控制字符后严格结构化解码
//! 3. 解码失败时，用正则直接从原文提取 "beat" 字段（容忍结构破损）
//! 4. 完全没有结构标记时，退回纯文本启发式:
//!    章节标题分割 -> 段落分组 -> 句子分组 -> 整体作为单章
//!
//! 数量越界的判定由调用方执行（越界应重试整次合成，而不是继续降级）。

use regex::Regex;
use serde_json::Value;

/// 大纲数量边界 [min, max]
#[derive(Debug, Clone, Copy)]
pub struct OutlineBounds {
    pub min: usize,
    pub max: usize,
}

impl OutlineBounds {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && count <= self.max
    }

    /// 启发式分组的目标章节数（区间中点）
    pub fn target(&self) -> usize {
        ((self.min + self.max) / 2).max(1)
    }
}

/// 解析结果（带来源标签）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineParse {
    /// 严格结构化解码成功
    Parsed(Vec<String>),
    /// 结构破损，字段级正则恢复
    FieldRecovered(Vec<String>),
    /// 无结构标记，纯文本启发式分段
    HeuristicSegmented(Vec<String>),
    /// 所有降级手段均失败
    Failed,
}

impl OutlineParse {
    pub fn beats(&self) -> Option<&[String]> {
        match self {
            OutlineParse::Parsed(b)
            | OutlineParse::FieldRecovered(b)
            | OutlineParse::HeuristicSegmented(b) => Some(b),
            OutlineParse::Failed => None,
        }
    }

    pub fn into_beats(self) -> Option<Vec<String>> {
        match self {
            OutlineParse::Parsed(b)
            | OutlineParse::FieldRecovered(b)
            | OutlineParse::HeuristicSegmented(b) => Some(b),
            OutlineParse::Failed => None,
        }
    }
}

/// 解析模型输出为大纲节拍列表
pub fn parse_outline(raw: &str, bounds: &OutlineBounds) -> OutlineParse {
    let defenced = strip_code_fences(raw);

    // 存在结构标记时走结构化路线，失败也不再退回纯文本启发式
    if defenced.contains(['[', '{']) {
        // 第 1-2 层: 括号截取 + 控制字符清理 + 严格解码
        if let Some(fragment) = extract_bracketed(&defenced) {
            let sanitized = strip_control_chars(&fragment);
            if let Some(beats) = decode_structured(&sanitized) {
                if !beats.is_empty() {
                    return OutlineParse::Parsed(beats);
                }
            }
        }

        // 第 3 层: 外层结构破损（含括号未闭合），但字段可能完好
        let recovered = recover_beat_fields(raw);
        if !recovered.is_empty() {
            return OutlineParse::FieldRecovered(recovered);
        }

        return OutlineParse::Failed;
    }

    // 第 4 层: 完全没有结构标记
    let segmented = segment_plain_text(&defenced, bounds.target());
    if segmented.is_empty() {
        OutlineParse::Failed
    } else {
        OutlineParse::HeuristicSegmented(segmented)
    }
}

/// 去除 Markdown 代码围栏标记（```json / ``` 行）
fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 截取第一个完整的括号片段
///
/// 从第一个 `[` 或 `{` 开始按嵌套深度扫描，跳过字符串字面量内部的
/// 括号字符，深度归零处截断。模型在 JSON 之后追加的说明文字被丢弃。
fn extract_bracketed(text: &str) -> Option<String> {
    let start = text.find(['[', '{'])?;
    let bytes = &text[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in bytes.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(bytes[..i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    // 括号未闭合
    None
}

/// 清理非法控制字符（保留 \n \r \t）
fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// 严格结构化解码
///
/// 接受的形态:
/// - `["beat", ...]`
/// - `[{"index": 1, "beat": "..."}, ...]`（字段名也接受 text/description）
/// - `{"outline": [...]}` 等单层包装对象（取第一个数组值）
fn decode_structured(text: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(text).ok()?;
    let array = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })?,
        _ => return None,
    };

    let mut beats = Vec::with_capacity(array.len());
    for item in array {
        let beat = match item {
            Value::String(s) => s,
            Value::Object(map) => map
                .get("beat")
                .or_else(|| map.get("text"))
                .or_else(|| map.get("description"))
                .and_then(Value::as_str)
                .map(str::to_string)?,
            _ => return None,
        };
        let beat = beat.trim().to_string();
        if !beat.is_empty() {
            beats.push(beat);
        }
    }
    Some(beats)
}

/// 字段级正则恢复
///
/// 直接从原文提取每个格式完好的 `"beat": "..."` 出现，
/// 外层结构（缺逗号、未闭合括号等）破损也不影响。
fn recover_beat_fields(raw: &str) -> Vec<String> {
    // 字符串内容允许转义序列
    let pattern = Regex::new(r#""(?:beat|text|description)"\s*:\s*"((?:\\.|[^"\\])*)""#)
        .expect("beat field pattern is valid");

    pattern
        .captures_iter(raw)
        .map(|cap| unescape_json_string(&cap[1]))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 还原 JSON 字符串转义
fn unescape_json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// 纯文本启发式分段
///
/// 依次尝试: 章节标题分割 -> 段落分组 -> 句子分组 -> 整体单章
fn segment_plain_text(text: &str, target: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let by_headers = split_by_headers(trimmed);
    if by_headers.len() >= 2 {
        return by_headers;
    }

    let paragraphs: Vec<&str> = trimmed
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if paragraphs.len() >= 2 {
        return group_toward_target(&paragraphs, target);
    }

    let sentences = split_sentences(trimmed);
    if sentences.len() >= 2 {
        let refs: Vec<&str> = sentences.iter().map(String::as_str).collect();
        return group_toward_target(&refs, target);
    }

    vec![trimmed.to_string()]
}

/// 按显式章节/场景标题行分割
fn split_by_headers(text: &str) -> Vec<String> {
    let header = Regex::new(r"(?mi)^\s*(?:第[0-9一二三四五六七八九十百千]+[章节回]|chapter\s+\d+|scene\s+\d+)\b[^\n]*$")
        .expect("header pattern is valid");

    let mut starts: Vec<usize> = header.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        return Vec::new();
    }
    starts.push(text.len());

    starts
        .windows(2)
        .map(|w| text[w[0]..w[1]].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 将若干块分为接近 target 组，每组拼为一条节拍
fn group_toward_target(blocks: &[&str], target: usize) -> Vec<String> {
    let groups = target.clamp(1, blocks.len());
    let per_group = blocks.len().div_ceil(groups);

    blocks
        .chunks(per_group)
        .map(|chunk| chunk.join("\n"))
        .collect()
}

/// 按句末标点分句
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?' | '。' | '！' | '？') {
            let s = current.trim().to_string();
            if !s.is_empty() {
                sentences.push(s);
            }
            current.clear();
        }
    }
    let s = current.trim().to_string();
    if !s.is_empty() {
        sentences.push(s);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> OutlineBounds {
        OutlineBounds::new(2, 10)
    }

    #[test]
    fn test_clean_json_array_of_strings() {
        let raw = r#"["少年离开村庄", "初遇导师", "第一次战斗"]"#;
        let result = parse_outline(raw, &bounds());
        assert_eq!(
            result,
            OutlineParse::Parsed(vec![
                "少年离开村庄".to_string(),
                "初遇导师".to_string(),
                "第一次战斗".to_string(),
            ])
        );
    }

    #[test]
    fn test_fenced_with_trailing_commentary() {
        // 围栏 + 前后闲聊 + 结尾附言都应被容忍
        let raw = "Here is your outline:\n```json\n[{\"index\": 1, \"beat\": \"开场\"}, {\"index\": 2, \"beat\": \"高潮\"}]\n```\nI hope this helps! Let me know if [you] need changes.";
        let result = parse_outline(raw, &bounds());
        assert_eq!(
            result,
            OutlineParse::Parsed(vec!["开场".to_string(), "高潮".to_string()])
        );
    }

    #[test]
    fn test_brackets_inside_strings_ignored() {
        let raw = r#"[{"index": 1, "beat": "他喊道 [不要过来]"}, {"index": 2, "beat": "雨夜 {转折}"}]"#;
        let result = parse_outline(raw, &bounds());
        let beats = result.beats().unwrap();
        assert_eq!(beats.len(), 2);
        assert_eq!(beats[0], "他喊道 [不要过来]");
    }

    #[test]
    fn test_control_chars_stripped_before_decode() {
        let raw = "[\"第一\u{0008}章\", \"第二章\"]";
        let result = parse_outline(raw, &bounds());
        assert_eq!(
            result,
            OutlineParse::Parsed(vec!["第一章".to_string(), "第二章".to_string()])
        );
    }

    #[test]
    fn test_wrapper_object_accepted() {
        let raw = r#"{"outline": ["a", "b", "c"]}"#;
        let result = parse_outline(raw, &bounds());
        assert!(matches!(result, OutlineParse::Parsed(ref b) if b.len() == 3));
    }

    #[test]
    fn test_field_recovery_from_broken_structure() {
        // 缺逗号 + 未闭合括号，结构化解码必然失败
        let raw = r#"[{"index": 1, "beat": "被篡改的开场"} {"index": 2, "beat": "丢失的结尾""#;
        let result = parse_outline(raw, &bounds());
        assert_eq!(
            result,
            OutlineParse::FieldRecovered(vec![
                "被篡改的开场".to_string(),
                "丢失的结尾".to_string(),
            ])
        );
    }

    #[test]
    fn test_field_recovery_unescapes() {
        let raw = r#"[{"beat": "他说 \"走\" 然后\n离开"} garbage"#;
        let result = parse_outline(raw, &bounds());
        let beats = result.beats().unwrap();
        assert_eq!(beats[0], "他说 \"走\" 然后\n离开");
    }

    #[test]
    fn test_plain_text_header_split() {
        let raw = "第一章 启程\n少年收拾行囊。\n\n第二章 相遇\n他在渡口遇见了她。";
        let result = parse_outline(raw, &bounds());
        match result {
            OutlineParse::HeuristicSegmented(beats) => {
                assert_eq!(beats.len(), 2);
                assert!(beats[0].contains("启程"));
                assert!(beats[1].contains("渡口"));
            }
            other => panic!("expected heuristic result, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_paragraph_grouping() {
        let raw = "段落一。\n\n段落二。\n\n段落三。\n\n段落四。\n\n段落五。\n\n段落六。";
        let result = parse_outline(raw, &OutlineBounds::new(3, 3));
        match result {
            OutlineParse::HeuristicSegmented(beats) => assert_eq!(beats.len(), 3),
            other => panic!("expected heuristic result, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_sentence_grouping() {
        let raw = "第一句。第二句。第三句。第四句。";
        let result = parse_outline(raw, &OutlineBounds::new(2, 2));
        match result {
            OutlineParse::HeuristicSegmented(beats) => assert_eq!(beats.len(), 2),
            other => panic!("expected heuristic result, got {:?}", other),
        }
    }

    #[test]
    fn test_single_blob_becomes_one_chapter() {
        let raw = "只有一段没有任何标点结构的文字";
        let result = parse_outline(raw, &bounds());
        assert_eq!(
            result,
            OutlineParse::HeuristicSegmented(vec![raw.to_string()])
        );
    }

    #[test]
    fn test_empty_input_fails() {
        assert_eq!(parse_outline("", &bounds()), OutlineParse::Failed);
        assert_eq!(parse_outline("   \n  ", &bounds()), OutlineParse::Failed);
    }

    #[test]
    fn test_unclosed_bracket_without_fields_fails() {
        let raw = "[1, 2, 3";
        assert_eq!(parse_outline(raw, &bounds()), OutlineParse::Failed);
    }

    #[test]
    fn test_beats_are_trimmed_and_ordered() {
        let raw = r#"["  第一拍  ", "第二拍", "  第三拍"]"#;
        let beats = parse_outline(raw, &bounds()).into_beats().unwrap();
        assert_eq!(beats, vec!["第一拍", "第二拍", "第三拍"]);
    }

    #[test]
    fn test_bounds_target_midpoint() {
        assert_eq!(OutlineBounds::new(4, 8).target(), 6);
        assert!(OutlineBounds::new(2, 5).contains(2));
        assert!(!OutlineBounds::new(2, 5).contains(6));
    }
}
