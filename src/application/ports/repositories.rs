//! Repository Ports - 出站端口
//!
//! 定义后端记录存储的抽象接口（按 story id / owner id 的记录 CRUD，
//! 无跨记录事务），具体实现在 infrastructure 层（SQLite）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::story::Chapter;

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 章节持久化形态（对外交换格式: {title, content, completed}）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterState {
    pub title: String,
    pub content: String,
    pub completed: bool,
    /// 来源节拍随章节一起存储，便于重建聚合
    #[serde(default)]
    pub beat: String,
}

impl From<&Chapter> for ChapterState {
    fn from(chapter: &Chapter) -> Self {
        Self {
            title: chapter.title().to_string(),
            content: chapter.content().to_string(),
            completed: chapter.completed(),
            beat: chapter.beat().to_string(),
        }
    }
}

impl ChapterState {
    pub fn into_chapter(self) -> Chapter {
        Chapter::restore(self.title, self.content, self.completed, self.beat)
    }
}

/// 故事实体（用于持久化）
#[derive(Debug, Clone)]
pub struct StoryRecord {
    pub id: Uuid,
    pub title: String,
    pub premise: String,
    /// 大纲节拍（JSON 数组存储）
    pub beats: Vec<String>,
    pub characters: String,
    /// 章节（JSON 数组存储，交换格式见 ChapterState）
    pub chapters: Vec<ChapterState>,
    pub owner_id: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 最近一次确认的后端同步时间（本地快照新旧判定的基准）
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Story Repository Port
#[async_trait]
pub trait StoryRepositoryPort: Send + Sync {
    /// 保存故事（upsert）
    async fn save(&self, story: &StoryRecord) -> Result<(), RepositoryError>;

    /// 根据 ID 查找故事
    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoryRecord>, RepositoryError>;

    /// 获取某用户的所有故事
    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<StoryRecord>, RepositoryError>;

    /// 删除故事
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// 只更新章节数组并推进同步时间戳（autosave flush 使用）
    async fn update_chapters(
        &self,
        id: Uuid,
        chapters: &[ChapterState],
        synced_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// 查询最近确认同步时间
    async fn last_synced_at(&self, id: Uuid) -> Result<Option<DateTime<Utc>>, RepositoryError>;
}
