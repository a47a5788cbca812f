//! 逐词揭示节奏
//!
//! 揭示进度由已流逝的墙钟时间换算，而不是固定间隔的 tick 计数。
//! 页面被后台化导致调度被节流时，下一次恢复执行会一次性补齐进度，
//! 不会丢拍也不会变慢。

use std::time::{Duration, Instant};

/// 按流逝时间计算应当揭示的词数（纯函数）
pub fn words_due(elapsed: Duration, words_per_sec: f64, total_words: usize) -> usize {
    if words_per_sec <= 0.0 {
        return total_words;
    }
    let due = (elapsed.as_secs_f64() * words_per_sec).floor() as usize;
    due.min(total_words)
}

/// 墙钟驱动的揭示节拍器
#[derive(Debug)]
pub struct RevealPacer {
    started: Instant,
    words_per_sec: f64,
    revealed: usize,
}

impl RevealPacer {
    pub fn new(words_per_sec: f64) -> Self {
        Self {
            started: Instant::now(),
            words_per_sec,
            revealed: 0,
        }
    }

    /// 此刻累计应当揭示的词数
    pub fn due(&self, total_words: usize) -> usize {
        words_due(self.started.elapsed(), self.words_per_sec, total_words)
    }

    /// 取出自上次调用以来新增的揭示词数
    pub fn take_newly_due(&mut self, total_words: usize) -> usize {
        let due = self.due(total_words);
        let newly = due.saturating_sub(self.revealed);
        self.revealed = due;
        newly
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_scales_with_elapsed_time() {
        assert_eq!(words_due(Duration::from_secs(0), 10.0, 100), 0);
        assert_eq!(words_due(Duration::from_secs(1), 10.0, 100), 10);
        assert_eq!(words_due(Duration::from_secs(5), 10.0, 100), 50);
    }

    #[test]
    fn test_due_capped_at_total() {
        assert_eq!(words_due(Duration::from_secs(60), 10.0, 100), 100);
    }

    #[test]
    fn test_throttled_scheduler_catches_up() {
        // 调度停摆 8 秒后恢复，单次调用补齐全部进度
        let before_throttle = words_due(Duration::from_secs(2), 5.0, 1000);
        let after_throttle = words_due(Duration::from_secs(10), 5.0, 1000);
        assert_eq!(before_throttle, 10);
        assert_eq!(after_throttle, 50);
    }

    #[test]
    fn test_non_positive_rate_reveals_everything() {
        assert_eq!(words_due(Duration::from_secs(1), 0.0, 42), 42);
    }

    #[test]
    fn test_pacer_take_newly_due_monotonic() {
        let mut pacer = RevealPacer::new(f64::MAX);
        let first = pacer.take_newly_due(10);
        let second = pacer.take_newly_due(10);
        assert_eq!(first, 10);
        assert_eq!(second, 0);
        assert_eq!(pacer.revealed(), 10);
    }
}
