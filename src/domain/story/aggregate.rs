//! Story Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Chapter, Premise, StoryError, StoryId, Title};

/// Story 聚合根
///
/// 不变量:
/// - chapters 与 beats 一一对应（由大纲播种后数量一致）
/// - 章节顺序在播种后不变，持久化按位置对齐
/// - parent 只在续作创建时设置一次
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    id: StoryId,
    title: Title,
    premise: Premise,
    /// 大纲节拍（与章节一一对应）
    beats: Vec<String>,
    /// 人物表（自由文本）
    characters: String,
    chapters: Vec<Chapter>,
    /// 所有者（外部用户体系的引用）
    owner_id: String,
    /// 前作链接（续作时指向上一部）
    parent_id: Option<StoryId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Story {
    /// 创建新故事（尚无大纲）
    pub fn new(title: Title, premise: Premise, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: StoryId::new(),
            title,
            premise,
            beats: Vec::new(),
            characters: String::new(),
            chapters: Vec::new(),
            owner_id: owner_id.into(),
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 用大纲节拍播种章节（1:1，默认标题，空正文）
    pub fn seed_chapters(&mut self, beats: Vec<String>) -> Result<(), StoryError> {
        if beats.is_empty() {
            return Err(StoryError::InvalidOutline("大纲不能为空".to_string()));
        }
        self.chapters = beats
            .iter()
            .enumerate()
            .map(|(i, beat)| Chapter::new(format!("Chapter {}", i + 1), beat.clone()))
            .collect();
        self.beats = beats;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 设置人物表
    pub fn set_characters(&mut self, characters: impl Into<String>) {
        self.characters = characters.into();
        self.updated_at = Utc::now();
    }

    /// 链接前作（续作创建）
    pub fn link_parent(&mut self, parent: StoryId) {
        self.parent_id = Some(parent);
        self.updated_at = Utc::now();
    }

    // Getters
    pub fn id(&self) -> &StoryId {
        &self.id
    }

    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn premise(&self) -> &Premise {
        &self.premise
    }

    pub fn beats(&self) -> &[String] {
        &self.beats
    }

    pub fn characters(&self) -> &str {
        &self.characters
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn parent_id(&self) -> Option<&StoryId> {
        self.parent_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_story() -> Story {
        let title = Title::new("测试故事").unwrap();
        let premise = Premise::new("一个少年的冒险").unwrap();
        Story::new(title, premise, "user-1")
    }

    #[test]
    fn test_seed_chapters_one_to_one() {
        let mut story = sample_story();
        story
            .seed_chapters(vec!["开场".to_string(), "转折".to_string(), "结局".to_string()])
            .unwrap();

        assert_eq!(story.chapter_count(), 3);
        assert_eq!(story.chapter(1).unwrap().beat(), "转折");
        assert_eq!(story.chapter(0).unwrap().title(), "Chapter 1");
        assert!(!story.chapter(0).unwrap().completed());
    }

    #[test]
    fn test_empty_outline_rejected() {
        let mut story = sample_story();
        assert!(story.seed_chapters(Vec::new()).is_err());
    }

    #[test]
    fn test_sequel_links_parent_once() {
        let mut story = sample_story();
        let parent = StoryId::new();
        story.link_parent(parent);
        assert_eq!(story.parent_id(), Some(&parent));
    }
}
