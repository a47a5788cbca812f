//! Story Context - Entities

use serde::{Deserialize, Serialize};

/// 章节 - 生成与编辑的基本单位
///
/// 不变量:
/// - completed == word_count(content) >= threshold
/// - beat 是生成该章节的大纲节拍，创建后不变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// 章节标题
    title: String,
    /// 正文内容
    content: String,
    /// 完成标记
    completed: bool,
    /// 来源节拍（大纲中对应的一条）
    beat: String,
}

impl Chapter {
    pub fn new(title: impl Into<String>, beat: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: String::new(),
            completed: false,
            beat: beat.into(),
        }
    }

    /// 从持久化状态还原（completed 来自存储，视为已确认）
    pub fn restore(title: String, content: String, completed: bool, beat: String) -> Self {
        Self {
            title,
            content,
            completed,
            beat,
        }
    }

    /// 统计正文词数（按空白分词）
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    /// 替换正文并按阈值重算完成标记
    pub fn set_content(&mut self, content: impl Into<String>, word_threshold: usize) {
        self.content = content.into();
        self.completed = self.word_count() >= word_threshold;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn beat(&self) -> &str {
        &self.beat
    }

    pub fn is_written(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_completion_threshold_boundary() {
        let mut chapter = Chapter::new("Chapter 1", "开场");

        // 399 词，阈值 400 => 未完成
        chapter.set_content(words(399), 400);
        assert!(!chapter.completed());

        // 400 词 => 完成
        chapter.set_content(words(400), 400);
        assert!(chapter.completed());
    }

    #[test]
    fn test_restore_trusts_stored_completion() {
        let chapter = Chapter::restore("t".into(), words(10), true, "b".into());
        assert!(chapter.completed());
        assert_eq!(chapter.word_count(), 10);
    }

    #[test]
    fn test_word_count_whitespace_split() {
        let mut chapter = Chapter::new("t", "b");
        chapter.set_content("one  two\nthree\tfour", 400);
        assert_eq!(chapter.word_count(), 4);
    }
}
