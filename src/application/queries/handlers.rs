//! Query Handlers
//!
//! 读侧只做组装，不触发任何状态变更。可恢复快照的判定用纯函数
//! reconcile 完成，真正的恢复/丢弃走 AutosaveService::load_with_recovery。

use std::sync::Arc;

use crate::application::autosave::AutosaveService;
use crate::application::error::ApplicationError;
use crate::application::ports::{SnapshotStorePort, StoryRepositoryPort, SNAPSHOT_SCHEMA_VERSION};
use crate::application::queries::{GetStory, ListStories, SnapshotInfo, StorySummary, StoryView};
use crate::application::reconcile::{reconcile, Reconciliation};

/// 故事详情查询处理器
pub struct GetStoryHandler {
    story_repo: Arc<dyn StoryRepositoryPort>,
    snapshot_store: Arc<dyn SnapshotStorePort>,
    autosave: Arc<AutosaveService>,
}

impl GetStoryHandler {
    pub fn new(
        story_repo: Arc<dyn StoryRepositoryPort>,
        snapshot_store: Arc<dyn SnapshotStorePort>,
        autosave: Arc<AutosaveService>,
    ) -> Self {
        Self {
            story_repo,
            snapshot_store,
            autosave,
        }
    }

    pub async fn handle(&self, query: GetStory) -> Result<StoryView, ApplicationError> {
        let record = self
            .story_repo
            .find_by_id(query.story_id)
            .await?
            .ok_or(ApplicationError::not_found("Story", query.story_id))?;

        // 只探测不清除: 恢复决定由编辑面随后显式提交
        let snapshot = self
            .snapshot_store
            .get(&query.story_id)
            .unwrap_or_default()
            .filter(|s| s.schema_version == SNAPSHOT_SCHEMA_VERSION);

        let saved_at_ms = snapshot.map(|s| s.saved_at_ms);
        let recoverable_snapshot = match reconcile(saved_at_ms, record.last_synced_at) {
            Reconciliation::SnapshotNewer => Some(SnapshotInfo {
                saved_at_ms: saved_at_ms.expect("snapshot present when newer"),
                last_synced_at: record.last_synced_at,
            }),
            _ => None,
        };

        let save_state = self.autosave.save_state(&query.story_id);
        Ok(StoryView {
            record,
            save_state,
            recoverable_snapshot,
        })
    }
}

/// 故事列表查询处理器
pub struct ListStoriesHandler {
    story_repo: Arc<dyn StoryRepositoryPort>,
}

impl ListStoriesHandler {
    pub fn new(story_repo: Arc<dyn StoryRepositoryPort>) -> Self {
        Self { story_repo }
    }

    pub async fn handle(
        &self,
        query: ListStories,
    ) -> Result<Vec<StorySummary>, ApplicationError> {
        let mut records = self.story_repo.find_by_owner(&query.owner_id).await?;
        // 最近更新的在前
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records.iter().map(StorySummary::from).collect())
    }
}
