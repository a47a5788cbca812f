//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（TextGenerator、Repository、SessionManager、SnapshotStore）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - autosave: 本地优先的自动保存服务（WAL + 去抖同步 + 退避重试）
//! - reconcile: 本地/后端快照对账（纯函数 + 注入式恢复确认策略）
//! - prompt: 提示词装配（剧透屏障、上下文窗口）
//! - pacing: 墙钟驱动的逐词揭示节奏
//! - error: 应用层错误定义

pub mod autosave;
pub mod commands;
pub mod error;
pub mod pacing;
pub mod ports;
pub mod prompt;
pub mod queries;
pub mod reconcile;

// Re-exports
pub use commands::{
    // Generation commands
    CancelGenerationCommand,
    CancelGenerationResponse,
    StartGenerationCommand,
    StartGenerationResponse,
    // Outline commands
    CreateOutlineCommand,
    CreateOutlineResponse,
    // Rewrite commands
    RefineChapterCommand,
    RefineChapterResponse,
    // Story commands
    CreateStoryCommand,
    CreateStoryResponse,
    // Handlers
    handlers::{
        CancelGenerationHandler, CreateStoryHandler, GenerationSettings, OutlineSynthesizer,
        RefineChapterHandler, RewriteSettings, StartGenerationHandler, SynthesizerSettings,
    },
};

pub use autosave::{AutosaveConfig, AutosaveService, SaveState};
pub use error::ApplicationError;
pub use reconcile::{
    reconcile, AlwaysDiscard, FixedChoice, Reconciliation, RecoveryChoice, RecoveryPrompt,
};

pub use ports::{
    // Session manager
    ActiveSession,
    ChapterSnapshot,
    // Repositories
    ChapterState,
    ChatMessage,
    ChatRole,
    DeltaStream,
    // Text generator
    GenerationError,
    GenerationRequest,
    ProviderKind,
    RepositoryError,
    SessionKind,
    SessionManagerPort,
    SessionToken,
    // Snapshot store
    SnapshotError,
    SnapshotStorePort,
    StoryRecord,
    StoryRepositoryPort,
    TextGeneratorPort,
    SNAPSHOT_SCHEMA_VERSION,
};

pub use queries::{
    handlers::{GetStoryHandler, ListStoriesHandler},
    GetStory,
    ListStories,
    SnapshotInfo,
    StorySummary,
    StoryView,
};
