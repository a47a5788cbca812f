//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    AutosaveService, CancelGenerationHandler, CreateStoryHandler, GenerationSettings,
    // Query handlers
    GetStoryHandler, ListStoriesHandler, OutlineSynthesizer, RefineChapterHandler,
    RewriteSettings, StartGenerationHandler, SynthesizerSettings,
    // Ports
    SessionManagerPort, SnapshotStorePort, StoryRepositoryPort, TextGeneratorPort,
};
use crate::infrastructure::events::EventPublisher;

/// 应用状态
pub struct AppState {
    // ========== Ports / Services ==========
    pub session_manager: Arc<dyn SessionManagerPort>,
    pub story_repo: Arc<dyn StoryRepositoryPort>,
    pub snapshot_store: Arc<dyn SnapshotStorePort>,
    pub generator: Arc<dyn TextGeneratorPort>,
    pub autosave: Arc<AutosaveService>,
    pub event_publisher: Arc<EventPublisher>,

    // ========== Command Handlers ==========
    pub create_story_handler: CreateStoryHandler,
    pub start_generation_handler: StartGenerationHandler,
    pub cancel_generation_handler: CancelGenerationHandler,
    pub refine_chapter_handler: RefineChapterHandler,

    // ========== Query Handlers ==========
    pub get_story_handler: GetStoryHandler,
    pub list_stories_handler: ListStoriesHandler,
}

impl AppState {
    /// 创建应用状态
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_manager: Arc<dyn SessionManagerPort>,
        story_repo: Arc<dyn StoryRepositoryPort>,
        snapshot_store: Arc<dyn SnapshotStorePort>,
        generator: Arc<dyn TextGeneratorPort>,
        autosave: Arc<AutosaveService>,
        event_publisher: Arc<EventPublisher>,
        generation_settings: GenerationSettings,
        synthesizer_settings: SynthesizerSettings,
        rewrite_settings: RewriteSettings,
    ) -> Self {
        let synthesizer = Arc::new(OutlineSynthesizer::new(
            generator.clone(),
            synthesizer_settings,
        ));

        Self {
            // Command handlers
            create_story_handler: CreateStoryHandler::new(synthesizer, story_repo.clone()),
            start_generation_handler: StartGenerationHandler::new(
                session_manager.clone(),
                story_repo.clone(),
                generator.clone(),
                autosave.clone(),
                event_publisher.clone(),
                generation_settings,
            ),
            cancel_generation_handler: CancelGenerationHandler::new(session_manager.clone()),
            refine_chapter_handler: RefineChapterHandler::new(
                generator.clone(),
                story_repo.clone(),
                autosave.clone(),
                event_publisher.clone(),
                rewrite_settings,
            ),

            // Query handlers
            get_story_handler: GetStoryHandler::new(
                story_repo.clone(),
                snapshot_store.clone(),
                autosave.clone(),
            ),
            list_stories_handler: ListStoriesHandler::new(story_repo.clone()),

            // Ports / Services
            session_manager,
            story_repo,
            snapshot_store,
            generator,
            autosave,
            event_publisher,
        }
    }
}
