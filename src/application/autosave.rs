//! 自动保存服务 - 本地优先的持久化
//!
//! 每次内容变更:
//! 1. 立即同步写入本地快照（write-ahead 记录）
//! 2. 标记待同步，由 AutosaveWorker 按去抖间隔调用 flush
//!
//! flush 语义是 at-least-once: 去抖定时器与退避重试定时器相互独立，
//! 同一变更可能触发多次 flush，靠内容指纹跳过冗余写入。
//! 快照只在确认后端写成功、且期间没有更新的编辑时才清除，
//! 因此已写文字从不单独依赖某一次远程写入。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    ChapterSnapshot, ChapterState, SnapshotError, SnapshotStorePort, StoryRecord,
    StoryRepositoryPort, SNAPSHOT_SCHEMA_VERSION,
};
use crate::application::reconcile::{reconcile, Reconciliation, RecoveryChoice, RecoveryPrompt};

/// 自动保存配置
#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    /// 去抖间隔（秒）
    pub debounce_secs: u64,
    /// 退避重试上限
    pub max_retries: u32,
    /// 退避基数（毫秒）
    pub backoff_base_ms: u64,
    /// 退避上限（毫秒）
    pub backoff_cap_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_secs: 5,
            max_retries: 5,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
        }
    }
}

/// 保存状态（对编辑面可见）
#[derive(Debug, Clone, Default)]
pub struct SaveState {
    pub pending_changes: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

/// 每故事的内部保存条目
#[derive(Debug, Clone, Default)]
struct SaveEntry {
    state: SaveState,
    /// 最新待同步章节
    chapters: Vec<ChapterState>,
    /// 最近确认同步内容的指纹
    last_synced_digest: Option<String>,
}

/// 快照恢复后的加载结果
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub record: StoryRecord,
    /// 本地快照被采纳为工作状态
    pub recovered: bool,
}

/// 自动保存服务
pub struct AutosaveService {
    snapshot_store: Arc<dyn SnapshotStorePort>,
    story_repo: Arc<dyn StoryRepositoryPort>,
    config: AutosaveConfig,
    entries: DashMap<Uuid, SaveEntry>,
}

/// 章节内容指纹（跳过与上次同步相同的冗余 flush）
fn chapters_digest(chapters: &[ChapterState]) -> String {
    let payload = serde_json::to_vec(chapters).unwrap_or_default();
    format!("{:x}", md5::compute(payload))
}

impl AutosaveService {
    pub fn new(
        snapshot_store: Arc<dyn SnapshotStorePort>,
        story_repo: Arc<dyn StoryRepositoryPort>,
        config: AutosaveConfig,
    ) -> Self {
        Self {
            snapshot_store,
            story_repo,
            config,
            entries: DashMap::new(),
        }
    }

    pub fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    /// 记录一次内容变更: 先写快照（WAL），再标记待同步
    ///
    /// 快照写失败时变更仍保留在内存并照常进入同步，只是失去断电保护
    pub fn record_edit(&self, story_id: Uuid, chapters: Vec<ChapterState>) {
        let snapshot = ChapterSnapshot::now(chapters.clone());
        if let Err(e) = self.snapshot_store.put(&story_id, &snapshot) {
            tracing::warn!(story_id = %story_id, error = %e, "Snapshot write failed");
        }

        let mut entry = self.entries.entry(story_id).or_default();
        entry.chapters = chapters;
        entry.state.pending_changes = true;
        // 新编辑重新开启同步窗口，之前耗尽的重试计数作废
        entry.state.retry_count = 0;
        tracing::debug!(story_id = %story_id, "Edit recorded, sync pending");
    }

    /// 当前保存状态
    pub fn save_state(&self, story_id: &Uuid) -> SaveState {
        self.entries
            .get(story_id)
            .map(|e| e.state.clone())
            .unwrap_or_default()
    }

    /// 所有待同步的故事
    pub fn pending_stories(&self) -> Vec<Uuid> {
        self.entries
            .iter()
            .filter(|e| e.state.pending_changes)
            .map(|e| *e.key())
            .collect()
    }

    /// 退避延迟: base * 2^retry，封顶 cap
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let exp = retry_count.min(16);
        let ms = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.config.backoff_cap_ms);
        Duration::from_millis(ms)
    }

    /// 重试是否已耗尽
    pub fn retries_exhausted(&self, story_id: &Uuid) -> bool {
        self.save_state(story_id).retry_count >= self.config.max_retries
    }

    /// 将待同步章节写入后端
    ///
    /// 可被去抖定时器与重试定时器重复调用（at-least-once），
    /// 靠指纹比较保证重复调用无害。返回是否发生了实际的后端写入。
    pub async fn flush(&self, story_id: Uuid) -> Result<bool, ApplicationError> {
        // 取出本次要写的内容（不持锁跨 await）
        let (chapters, digest) = {
            let Some(entry) = self.entries.get(&story_id) else {
                return Ok(false);
            };
            if !entry.state.pending_changes {
                return Ok(false);
            }
            let digest = chapters_digest(&entry.chapters);
            if entry.last_synced_digest.as_deref() == Some(digest.as_str()) {
                drop(entry);
                // 内容与上次确认同步一致，本地快照已无增量价值
                self.mark_synced(story_id, None, &digest);
                return Ok(false);
            }
            (entry.chapters.clone(), digest)
        };

        let synced_at = Utc::now();
        match self
            .story_repo
            .update_chapters(story_id, &chapters, synced_at)
            .await
        {
            Ok(()) => {
                self.mark_synced(story_id, Some(synced_at), &digest);
                tracing::info!(story_id = %story_id, chapters = chapters.len(), "Chapters synced");
                Ok(true)
            }
            Err(e) => {
                let retry_count = {
                    let mut entry = self.entries.entry(story_id).or_default();
                    entry.state.retry_count += 1;
                    entry.state.last_error = Some(e.to_string());
                    entry.state.retry_count
                };
                tracing::warn!(
                    story_id = %story_id,
                    retry_count = retry_count,
                    error = %e,
                    "Backend sync failed, snapshot retained"
                );
                Err(ApplicationError::RepositoryError(e.to_string()))
            }
        }
    }

    /// 标记同步成功；仅当期间没有更新的编辑时清除 pending 与快照
    fn mark_synced(&self, story_id: Uuid, synced_at: Option<DateTime<Utc>>, digest: &str) {
        let mut clear_snapshot = false;
        if let Some(mut entry) = self.entries.get_mut(&story_id) {
            if let Some(at) = synced_at {
                entry.state.last_synced_at = Some(at);
            }
            entry.last_synced_digest = Some(digest.to_string());
            entry.state.retry_count = 0;
            entry.state.last_error = None;

            // flush 期间可能又有新编辑进来，此时 pending 必须保留
            if chapters_digest(&entry.chapters) == digest {
                entry.state.pending_changes = false;
                clear_snapshot = true;
            }
        }

        if clear_snapshot {
            if let Err(e) = self.snapshot_store.remove(&story_id) {
                tracing::warn!(story_id = %story_id, error = %e, "Snapshot cleanup failed");
            }
        }
    }

    /// 加载故事并执行快照对账
    ///
    /// 快照严格更新时通过注入的 RecoveryPrompt 征求决定；
    /// 采纳恢复会把快照按位置对齐到章节数组并重新标记待同步，
    /// 拒绝则清除快照。
    pub async fn load_with_recovery(
        &self,
        story_id: Uuid,
        prompt: &dyn RecoveryPrompt,
    ) -> Result<LoadOutcome, ApplicationError> {
        let mut record = self
            .story_repo
            .find_by_id(story_id)
            .await?
            .ok_or(ApplicationError::not_found("Story", story_id))?;

        let snapshot = match self.snapshot_store.get(&story_id) {
            Ok(s) => s,
            Err(SnapshotError::SchemaMismatch { found }) => {
                tracing::warn!(
                    story_id = %story_id,
                    found,
                    "Discarding snapshot with unsupported schema version"
                );
                let _ = self.snapshot_store.remove(&story_id);
                None
            }
            Err(e) => {
                tracing::warn!(story_id = %story_id, error = %e, "Snapshot read failed");
                None
            }
        };

        // 旧版本格式的快照直接作废
        let snapshot = snapshot.filter(|s| {
            if s.schema_version == SNAPSHOT_SCHEMA_VERSION {
                true
            } else {
                tracing::warn!(
                    story_id = %story_id,
                    found = s.schema_version,
                    "Discarding snapshot with unsupported schema version"
                );
                let _ = self.snapshot_store.remove(&story_id);
                false
            }
        });

        let saved_at_ms = snapshot.as_ref().map(|s| s.saved_at_ms);
        match reconcile(saved_at_ms, record.last_synced_at) {
            Reconciliation::NoSnapshot => Ok(LoadOutcome {
                record,
                recovered: false,
            }),
            Reconciliation::SnapshotStale => {
                let _ = self.snapshot_store.remove(&story_id);
                Ok(LoadOutcome {
                    record,
                    recovered: false,
                })
            }
            Reconciliation::SnapshotNewer => {
                let snapshot = snapshot.expect("snapshot present when newer");
                let choice = prompt
                    .resolve(&story_id, snapshot.saved_at_ms, record.last_synced_at)
                    .await;
                match choice {
                    RecoveryChoice::Recover => {
                        // 按数组位置对齐（已知限制: 章节数变化时可能错位）
                        record.chapters = snapshot.chapters.clone();
                        self.record_edit(story_id, snapshot.chapters);
                        tracing::info!(story_id = %story_id, "Local snapshot recovered");
                        Ok(LoadOutcome {
                            record,
                            recovered: true,
                        })
                    }
                    RecoveryChoice::Discard => {
                        if let Err(e) = self.snapshot_store.remove(&story_id) {
                            tracing::warn!(story_id = %story_id, error = %e, "Snapshot purge failed");
                        }
                        tracing::info!(story_id = %story_id, "Local snapshot discarded");
                        Ok(LoadOutcome {
                            record,
                            recovered: false,
                        })
                    }
                }
            }
        }
    }
}
