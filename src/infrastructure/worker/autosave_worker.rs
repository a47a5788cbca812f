//! Autosave Worker - Background Sync Processor
//!
//! 去抖定时器周期性地把待同步故事 flush 到后端；失败的故事
//! 另起独立的退避重试链。两类定时器可能对同一故事各触发一次
//! flush，at-least-once 语义由 AutosaveService 的内容指纹兜底。
//!
//! 重试耗尽只发一次警告事件并停止自动重试——本地快照仍然保留，
//! 下一次编辑会重新进入同步队列。

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::autosave::AutosaveService;
use crate::infrastructure::events::EventPublisher;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct AutosaveWorkerConfig {
    /// 去抖间隔（秒）
    pub debounce_secs: u64,
}

impl Default for AutosaveWorkerConfig {
    fn default() -> Self {
        Self { debounce_secs: 5 }
    }
}

/// 自动保存 Worker
pub struct AutosaveWorker {
    config: AutosaveWorkerConfig,
    autosave: Arc<AutosaveService>,
    publisher: Arc<EventPublisher>,
    shutdown: CancellationToken,
    /// 正在退避重试中的故事（避免重复重试链）
    retrying: Arc<DashMap<Uuid, ()>>,
}

impl AutosaveWorker {
    pub fn new(
        config: AutosaveWorkerConfig,
        autosave: Arc<AutosaveService>,
        publisher: Arc<EventPublisher>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            autosave,
            publisher,
            shutdown,
            retrying: Arc::new(DashMap::new()),
        }
    }

    /// 启动 Worker
    pub async fn run(self) {
        tracing::info!(
            debounce_secs = self.config.debounce_secs,
            "AutosaveWorker started"
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.debounce_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for story_id in self.autosave.pending_stories() {
                        self.flush_one(story_id).await;
                    }
                }
                _ = self.shutdown.cancelled() => {
                    break;
                }
            }
        }

        // 优雅停机: 最后一轮尽力同步，失败的靠快照撑到下次启动
        for story_id in self.autosave.pending_stories() {
            if let Err(e) = self.autosave.flush(story_id).await {
                tracing::warn!(
                    story_id = %story_id,
                    error = %e,
                    "Final flush failed, snapshot retained for next start"
                );
            }
        }

        tracing::info!("AutosaveWorker stopped");
    }

    async fn flush_one(&self, story_id: Uuid) {
        // 退避重试链正在处理的故事不再从去抖路径重复进入；
        // 重试已耗尽的故事等待下一次编辑重置计数
        if self.retrying.contains_key(&story_id) || self.autosave.retries_exhausted(&story_id) {
            return;
        }

        match self.autosave.flush(story_id).await {
            Ok(_) => self.publish_state(story_id),
            Err(_) => {
                self.publish_state(story_id);
                self.spawn_retry_chain(story_id);
            }
        }
    }

    /// 独立的退避重试链（每故事最多一条）
    fn spawn_retry_chain(&self, story_id: Uuid) {
        if self.retrying.insert(story_id, ()).is_some() {
            return;
        }

        let autosave = self.autosave.clone();
        let publisher = self.publisher.clone();
        let retrying = self.retrying.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let state = autosave.save_state(&story_id);
                if !state.pending_changes {
                    break;
                }
                if autosave.retries_exhausted(&story_id) {
                    let error = state.last_error.as_deref().unwrap_or("unknown error");
                    tracing::error!(
                        story_id = %story_id,
                        retry_count = state.retry_count,
                        error = %error,
                        "Backend sync retries exhausted, snapshot retained"
                    );
                    publisher.publish_save_retries_exhausted(story_id, error);
                    break;
                }

                let delay = autosave.backoff_delay(state.retry_count);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.cancelled() => break,
                }

                let result = autosave.flush(story_id).await;
                let state = autosave.save_state(&story_id);
                publisher.publish_save_state(
                    story_id,
                    state.pending_changes,
                    state.last_synced_at,
                    state.retry_count,
                );
                if result.is_ok() {
                    break;
                }
            }
            retrying.remove(&story_id);
        });
    }

    fn publish_state(&self, story_id: Uuid) {
        let state = self.autosave.save_state(&story_id);
        self.publisher.publish_save_state(
            story_id,
            state.pending_changes,
            state.last_synced_at,
            state.retry_count,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::autosave::AutosaveConfig;
    use crate::application::ports::{
        ChapterSnapshot, ChapterState, RepositoryError, SnapshotError, SnapshotStorePort,
        StoryRecord, StoryRepositoryPort,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemSnapshotStore {
        entries: DashMap<Uuid, ChapterSnapshot>,
    }

    impl SnapshotStorePort for MemSnapshotStore {
        fn put(&self, id: &Uuid, snapshot: &ChapterSnapshot) -> Result<(), SnapshotError> {
            self.entries.insert(*id, snapshot.clone());
            Ok(())
        }
        fn get(&self, id: &Uuid) -> Result<Option<ChapterSnapshot>, SnapshotError> {
            Ok(self.entries.get(id).map(|e| e.clone()))
        }
        fn remove(&self, id: &Uuid) -> Result<(), SnapshotError> {
            self.entries.remove(id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlakyStoryRepo {
        records: Mutex<Vec<StoryRecord>>,
        fail_next: AtomicU32,
        write_count: AtomicU32,
    }

    #[async_trait]
    impl StoryRepositoryPort for FlakyStoryRepo {
        async fn save(&self, story: &StoryRecord) -> Result<(), RepositoryError> {
            self.records.lock().unwrap().push(story.clone());
            Ok(())
        }
        async fn find_by_id(&self, id: Uuid) -> Result<Option<StoryRecord>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned())
        }
        async fn find_by_owner(&self, _o: &str) -> Result<Vec<StoryRecord>, RepositoryError> {
            Ok(vec![])
        }
        async fn delete(&self, _id: Uuid) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn update_chapters(
            &self,
            id: Uuid,
            chapters: &[ChapterState],
            synced_at: DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            if self.fail_next.load(Ordering::SeqCst) > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                return Err(RepositoryError::DatabaseError("injected failure".into()));
            }
            self.write_count.fetch_add(1, Ordering::SeqCst);
            let mut records = self.records.lock().unwrap();
            if let Some(r) = records.iter_mut().find(|r| r.id == id) {
                r.chapters = chapters.to_vec();
                r.last_synced_at = Some(synced_at);
            }
            Ok(())
        }
        async fn last_synced_at(
            &self,
            _id: Uuid,
        ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
            Ok(None)
        }
    }

    fn record(id: Uuid) -> StoryRecord {
        StoryRecord {
            id,
            title: "t".into(),
            premise: "p".into(),
            beats: vec![],
            characters: String::new(),
            chapters: vec![],
            owner_id: "u".into(),
            parent_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_synced_at: None,
        }
    }

    fn chapters() -> Vec<ChapterState> {
        vec![ChapterState {
            title: "Chapter 1".into(),
            content: "edited".into(),
            completed: false,
            beat: "b".into(),
        }]
    }

    #[tokio::test]
    async fn test_pending_story_synced_on_tick() {
        let id = Uuid::new_v4();
        let repo = Arc::new(FlakyStoryRepo::default());
        repo.save(&record(id)).await.unwrap();
        let autosave = Arc::new(AutosaveService::new(
            Arc::new(MemSnapshotStore::default()),
            repo.clone(),
            AutosaveConfig {
                debounce_secs: 1,
                ..Default::default()
            },
        ));

        autosave.record_edit(id, chapters());

        let shutdown = CancellationToken::new();
        let worker = AutosaveWorker::new(
            AutosaveWorkerConfig { debounce_secs: 1 },
            autosave.clone(),
            EventPublisher::new().arc(),
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        // 首个 tick 立即触发
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!autosave.save_state(&id).pending_changes);
        assert_eq!(repo.write_count.load(Ordering::SeqCst), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_chain_recovers_after_transient_failures() {
        let id = Uuid::new_v4();
        let repo = Arc::new(FlakyStoryRepo::default());
        repo.save(&record(id)).await.unwrap();
        repo.fail_next.store(2, Ordering::SeqCst);

        let autosave = Arc::new(AutosaveService::new(
            Arc::new(MemSnapshotStore::default()),
            repo.clone(),
            AutosaveConfig {
                debounce_secs: 1,
                max_retries: 5,
                backoff_base_ms: 10,
                backoff_cap_ms: 50,
            },
        ));
        autosave.record_edit(id, chapters());

        let shutdown = CancellationToken::new();
        let worker = AutosaveWorker::new(
            AutosaveWorkerConfig { debounce_secs: 1 },
            autosave.clone(),
            EventPublisher::new().arc(),
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        // 两次注入失败后退避链第三次成功
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!autosave.save_state(&id).pending_changes);
        assert_eq!(repo.write_count.load(Ordering::SeqCst), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_exhausted_retries_emit_warning_once() {
        let id = Uuid::new_v4();
        let repo = Arc::new(FlakyStoryRepo::default());
        repo.save(&record(id)).await.unwrap();
        repo.fail_next.store(100, Ordering::SeqCst);

        let autosave = Arc::new(AutosaveService::new(
            Arc::new(MemSnapshotStore::default()),
            repo.clone(),
            AutosaveConfig {
                debounce_secs: 1,
                max_retries: 2,
                backoff_base_ms: 10,
                backoff_cap_ms: 20,
            },
        ));
        autosave.record_edit(id, chapters());

        let publisher = EventPublisher::new().arc();
        let mut events = publisher.subscribe_global();

        let shutdown = CancellationToken::new();
        let worker = AutosaveWorker::new(
            AutosaveWorkerConfig { debounce_secs: 1 },
            autosave.clone(),
            publisher.clone(),
            shutdown.clone(),
        );
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let mut warnings = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(
                event,
                crate::infrastructure::events::WsEvent::SaveRetriesExhausted { .. }
            ) {
                warnings += 1;
            }
        }
        assert_eq!(warnings, 1);
        // 仍然 pending: 快照保留，下次编辑/启动重新入队
        assert!(autosave.save_state(&id).pending_changes);
    }
}
