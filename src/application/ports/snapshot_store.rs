//! Snapshot Store Port - 本地快照（写前记录）
//!
//! 定义本地持久快照的抽象接口，具体实现使用 Sled。
//!
//! 每次内容变更先同步写入快照再进入去抖同步，后端写失败时
//! 快照保证不丢数据；只有确认同步成功后才清除。
//! 同一 story id 的写入为 last-writer-wins，无跨编辑面加锁（已知限制）。

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::ChapterState;

/// 快照格式版本
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Snapshot Store 错误
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Unsupported snapshot schema version: {found}")]
    SchemaMismatch { found: u32 },
}

/// 版本化章节快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSnapshot {
    /// 格式版本（升级时据此迁移或丢弃）
    pub schema_version: u32,
    /// 墙钟时间戳（毫秒），与 last_synced_at 比较判定新旧
    pub saved_at_ms: i64,
    pub chapters: Vec<ChapterState>,
}

impl ChapterSnapshot {
    /// 以当前墙钟时间创建快照
    pub fn now(chapters: Vec<ChapterState>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at_ms: chrono::Utc::now().timestamp_millis(),
            chapters,
        }
    }
}

/// Snapshot Store Port
///
/// 同步接口: 快照写入必须发生在内容变更的同一执行点，
/// 不允许被调度延迟（write-ahead 语义）
pub trait SnapshotStorePort: Send + Sync {
    /// 写入（覆盖）某故事的快照
    fn put(&self, story_id: &Uuid, snapshot: &ChapterSnapshot) -> Result<(), SnapshotError>;

    /// 读取某故事的快照
    fn get(&self, story_id: &Uuid) -> Result<Option<ChapterSnapshot>, SnapshotError>;

    /// 删除某故事的快照（确认同步成功或用户放弃恢复后）
    fn remove(&self, story_id: &Uuid) -> Result<(), SnapshotError>;
}
