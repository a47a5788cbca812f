//! Story Queries - 查询与视图模型

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::application::autosave::SaveState;
use crate::application::ports::StoryRecord;

/// 获取单个故事（含保存状态与可恢复快照信息）
#[derive(Debug, Clone)]
pub struct GetStory {
    pub story_id: Uuid,
}

/// 列出某用户的故事
#[derive(Debug, Clone)]
pub struct ListStories {
    pub owner_id: String,
}

/// 可恢复的本地快照信息（仅当快照严格更新时存在）
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub saved_at_ms: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// 故事详情视图
#[derive(Debug, Clone)]
pub struct StoryView {
    pub record: StoryRecord,
    pub save_state: SaveState,
    /// 存在时编辑面应弹出恢复确认
    pub recoverable_snapshot: Option<SnapshotInfo>,
}

/// 故事列表项
#[derive(Debug, Clone, Serialize)]
pub struct StorySummary {
    pub id: Uuid,
    pub title: String,
    pub premise: String,
    pub chapter_count: usize,
    pub completed_count: usize,
    pub parent_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl From<&StoryRecord> for StorySummary {
    fn from(record: &StoryRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            premise: record.premise.clone(),
            chapter_count: record.chapters.len(),
            completed_count: record.chapters.iter().filter(|c| c.completed).count(),
            parent_id: record.parent_id,
            updated_at: record.updated_at,
        }
    }
}
