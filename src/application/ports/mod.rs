//! Application Ports - 端口定义
//!
//! 入站/出站端口抽象，具体实现在 infrastructure 层:
//! - TextGeneratorPort: 外部文本生成服务（OpenRouter / Gemini / Fake）
//! - SessionManagerPort: 生成会话 token 注册与失效
//! - StoryRepositoryPort: 后端记录存储（SQLite）
//! - SnapshotStorePort: 浏览器侧本地快照的服务端等价物（Sled WAL）

mod repositories;
mod session_manager;
mod snapshot_store;
mod text_generator;

pub use repositories::{ChapterState, RepositoryError, StoryRecord, StoryRepositoryPort};
pub use session_manager::{ActiveSession, SessionKind, SessionManagerPort, SessionToken};
pub use snapshot_store::{
    ChapterSnapshot, SnapshotError, SnapshotStorePort, SNAPSHOT_SCHEMA_VERSION,
};
pub use text_generator::{
    ChatMessage, ChatRole, DeltaStream, GenerationError, GenerationRequest, ProviderKind,
    TextGeneratorPort,
};
