//! Rewrite Handlers - 分块润色重写
//!
//! 章节正文切成对话/叙述/空白片段，只重写叙述段，
//! 对话与空白逐字保留。单段失败回退原文，不中断整体流程，
//! 重组严格按原始顺序，因此任何失败组合下输出仍是合法章节。

use std::sync::Arc;

use uuid::Uuid;

use crate::application::autosave::AutosaveService;
use crate::application::commands::{RefineChapterCommand, RefineChapterResponse};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    ChapterState, GenerationRequest, StoryRepositoryPort, TextGeneratorPort,
};
use crate::application::prompt::rewrite_section_messages;
use crate::domain::{split_into_sections, SectionKind};
use crate::infrastructure::events::EventPublisher;

/// 重写参数
#[derive(Debug, Clone)]
pub struct RewriteSettings {
    pub model: String,
    pub temperature: f32,
    /// 章节完成判定的词数阈值
    pub word_threshold: usize,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.9,
            word_threshold: 400,
        }
    }
}

/// 章节润色处理器
pub struct RefineChapterHandler {
    generator: Arc<dyn TextGeneratorPort>,
    story_repo: Arc<dyn StoryRepositoryPort>,
    autosave: Arc<AutosaveService>,
    publisher: Arc<EventPublisher>,
    settings: RewriteSettings,
}

impl RefineChapterHandler {
    pub fn new(
        generator: Arc<dyn TextGeneratorPort>,
        story_repo: Arc<dyn StoryRepositoryPort>,
        autosave: Arc<AutosaveService>,
        publisher: Arc<EventPublisher>,
        settings: RewriteSettings,
    ) -> Self {
        Self {
            generator,
            story_repo,
            autosave,
            publisher,
            settings,
        }
    }

    /// 逐段重写一个章节
    pub async fn handle(
        &self,
        command: RefineChapterCommand,
    ) -> Result<RefineChapterResponse, ApplicationError> {
        let record = self
            .story_repo
            .find_by_id(command.story_id)
            .await?
            .ok_or(ApplicationError::not_found("Story", command.story_id))?;

        if command.chapter_index >= record.chapters.len() {
            return Err(ApplicationError::validation(format!(
                "章节索引越界: {} / {}",
                command.chapter_index,
                record.chapters.len()
            )));
        }

        let original = record.chapters[command.chapter_index].content.clone();
        if original.trim().is_empty() {
            return Err(ApplicationError::validation(
                "空章节无法润色".to_string(),
            ));
        }

        let (content, rewritten, fallback) = self
            .rewrite_sections(
                command.story_id,
                command.chapter_index,
                &original,
                &command.style_instruction,
            )
            .await;

        self.persist(command.story_id, command.chapter_index, record, &content);

        tracing::info!(
            story_id = %command.story_id,
            chapter_index = command.chapter_index,
            rewritten,
            fallback,
            "Chapter refined"
        );

        Ok(RefineChapterResponse {
            story_id: command.story_id,
            chapter_index: command.chapter_index,
            content,
            rewritten_sections: rewritten,
            fallback_sections: fallback,
        })
    }

    /// 按原始顺序重写叙述段，返回 (重组正文, 重写段数, 回退段数)
    async fn rewrite_sections(
        &self,
        story_id: Uuid,
        chapter_index: usize,
        original: &str,
        style_instruction: &str,
    ) -> (String, usize, usize) {
        let sections = split_into_sections(original);
        let mut output = String::with_capacity(original.len());
        let mut rewritten = 0usize;
        let mut fallback = 0usize;

        for (index, section) in sections.iter().enumerate() {
            match section.kind {
                // 对话与空白逐字保留
                SectionKind::Dialogue | SectionKind::Whitespace => {
                    output.push_str(&section.text);
                }
                SectionKind::Narrative => {
                    let request = GenerationRequest::new(
                        &self.settings.model,
                        rewrite_section_messages(&section.text, style_instruction),
                    )
                    .with_temperature(self.settings.temperature);

                    match self.generator.complete(request).await {
                        Ok(replacement) => {
                            output.push_str(replacement.trim());
                            rewritten += 1;
                            self.publisher.publish_section_rewritten(
                                story_id,
                                chapter_index,
                                index,
                                false,
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                story_id = %story_id,
                                chapter_index,
                                section_index = index,
                                error = %e,
                                "Section rewrite failed, keeping original text"
                            );
                            output.push_str(&section.text);
                            fallback += 1;
                            self.publisher.publish_section_rewritten(
                                story_id,
                                chapter_index,
                                index,
                                true,
                            );
                        }
                    }
                }
            }
        }

        (output, rewritten, fallback)
    }

    fn persist(
        &self,
        story_id: Uuid,
        chapter_index: usize,
        record: crate::application::ports::StoryRecord,
        content: &str,
    ) {
        let mut chapters: Vec<ChapterState> = record.chapters;
        let mut chapter = chapters[chapter_index].clone().into_chapter();
        chapter.set_content(content, self.settings.word_threshold);
        chapters[chapter_index] = ChapterState::from(&chapter);
        self.autosave.record_edit(story_id, chapters);
    }
}
