//! Story Handlers - 故事创建
//!
//! 创建 = 大纲合成 + 人物表生成 + 章节播种 + 首次持久化。
//! 人物表是锦上添花: 生成失败降级为空表，不阻塞创建。

use std::sync::Arc;

use crate::application::commands::handlers::OutlineSynthesizer;
use crate::application::commands::{
    CreateOutlineCommand, CreateStoryCommand, CreateStoryResponse,
};
use crate::application::error::ApplicationError;
use crate::application::ports::{ChapterState, StoryRecord, StoryRepositoryPort};
use crate::domain::story::{Premise, Story, StoryId, Title};

/// 创建故事处理器
pub struct CreateStoryHandler {
    synthesizer: Arc<OutlineSynthesizer>,
    story_repo: Arc<dyn StoryRepositoryPort>,
}

impl CreateStoryHandler {
    pub fn new(
        synthesizer: Arc<OutlineSynthesizer>,
        story_repo: Arc<dyn StoryRepositoryPort>,
    ) -> Self {
        Self {
            synthesizer,
            story_repo,
        }
    }

    pub async fn handle(
        &self,
        command: CreateStoryCommand,
    ) -> Result<CreateStoryResponse, ApplicationError> {
        let title = Title::new(&command.title)
            .map_err(|e| ApplicationError::validation(e.to_string()))?;
        let premise = Premise::new(&command.premise)
            .map_err(|e| ApplicationError::validation(e.to_string()))?;

        // 续作要求前作存在
        if let Some(parent_id) = command.parent_id {
            self.story_repo
                .find_by_id(parent_id)
                .await?
                .ok_or(ApplicationError::not_found("Story", parent_id))?;
        }

        let outline = self
            .synthesizer
            .synthesize(CreateOutlineCommand {
                premise: command.premise.clone(),
                min_chapters: command.min_chapters,
                max_chapters: command.max_chapters,
            })
            .await?;

        let characters = match self
            .synthesizer
            .generate_characters(&command.premise, &outline.beats)
            .await
        {
            Ok(roster) => roster,
            Err(e) => {
                tracing::warn!(error = %e, "Character roster generation failed, continuing without");
                String::new()
            }
        };

        let mut story = Story::new(title, premise, command.owner_id);
        story
            .seed_chapters(outline.beats.clone())
            .map_err(|e| ApplicationError::validation(e.to_string()))?;
        story.set_characters(&characters);
        if let Some(parent_id) = command.parent_id {
            story.link_parent(StoryId::from_uuid(parent_id));
        }

        let record = story_to_record(&story);
        self.story_repo.save(&record).await?;

        tracing::info!(
            story_id = %record.id,
            chapters = record.chapters.len(),
            outline_tier = outline.parse_tier,
            "Story created"
        );

        Ok(CreateStoryResponse {
            id: record.id,
            title: record.title,
            beats: outline.beats,
            characters,
        })
    }
}

/// 聚合到持久化记录的映射
pub fn story_to_record(story: &Story) -> StoryRecord {
    StoryRecord {
        id: *story.id().as_uuid(),
        title: story.title().as_str().to_string(),
        premise: story.premise().as_str().to_string(),
        beats: story.beats().to_vec(),
        characters: story.characters().to_string(),
        chapters: story.chapters().iter().map(ChapterState::from).collect(),
        owner_id: story.owner_id().to_string(),
        parent_id: story.parent_id().map(|p| *p.as_uuid()),
        created_at: story.created_at(),
        updated_at: story.updated_at(),
        last_synced_at: None,
    }
}
