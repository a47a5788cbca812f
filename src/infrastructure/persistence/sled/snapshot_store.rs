//! Sled-based Chapter Snapshot Store Implementation
//!
//! 本地优先持久化的 write-ahead 一侧: 每次编辑先落到这里，
//! 后端确认同步后才清除。进程崩溃或断电后快照仍在磁盘上，
//! 下次打开故事时走对账恢复流程。

use sled::Db;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::{
    ChapterSnapshot, SnapshotError, SnapshotStorePort, SNAPSHOT_SCHEMA_VERSION,
};

/// Sled 快照存储配置
#[derive(Debug, Clone)]
pub struct SledSnapshotConfig {
    /// 数据库路径
    pub db_path: String,
}

impl Default for SledSnapshotConfig {
    fn default() -> Self {
        Self {
            db_path: "data/snapshots.sled".to_string(),
        }
    }
}

/// Sled 章节快照存储
pub struct SledSnapshotStore {
    db: Db,
}

impl SledSnapshotStore {
    pub fn new(config: &SledSnapshotConfig) -> Result<Self, SnapshotError> {
        let db = sled::open(&config.db_path)
            .map_err(|e| SnapshotError::DatabaseError(e.to_string()))?;

        let existing = db.scan_prefix("snapshot:").count();
        tracing::info!(
            db_path = %config.db_path,
            existing_snapshots = existing,
            "SledSnapshotStore initialized"
        );

        Ok(Self { db })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        Self::new(&SledSnapshotConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
        })
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 刷新到磁盘（优雅停机时调用）
    pub fn flush(&self) -> Result<(), SnapshotError> {
        self.db
            .flush()
            .map_err(|e| SnapshotError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    fn key(story_id: &Uuid) -> String {
        format!("snapshot:{}", story_id)
    }
}

impl SnapshotStorePort for SledSnapshotStore {
    fn put(&self, story_id: &Uuid, snapshot: &ChapterSnapshot) -> Result<(), SnapshotError> {
        let bytes = bincode::serialize(snapshot)
            .map_err(|e| SnapshotError::SerializationError(e.to_string()))?;

        self.db
            .insert(Self::key(story_id), bytes)
            .map_err(|e| SnapshotError::DatabaseError(e.to_string()))?;

        tracing::debug!(
            story_id = %story_id,
            chapters = snapshot.chapters.len(),
            "Snapshot written"
        );
        Ok(())
    }

    fn get(&self, story_id: &Uuid) -> Result<Option<ChapterSnapshot>, SnapshotError> {
        match self.db.get(Self::key(story_id)) {
            Ok(Some(bytes)) => {
                let snapshot: ChapterSnapshot = bincode::deserialize(&bytes)
                    .map_err(|e| SnapshotError::SerializationError(e.to_string()))?;
                if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
                    return Err(SnapshotError::SchemaMismatch {
                        found: snapshot.schema_version,
                    });
                }
                Ok(Some(snapshot))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(SnapshotError::DatabaseError(e.to_string())),
        }
    }

    fn remove(&self, story_id: &Uuid) -> Result<(), SnapshotError> {
        self.db
            .remove(Self::key(story_id))
            .map_err(|e| SnapshotError::DatabaseError(e.to_string()))?;
        tracing::debug!(story_id = %story_id, "Snapshot removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ChapterState;
    use tempfile::tempdir;

    fn chapters() -> Vec<ChapterState> {
        vec![ChapterState {
            title: "Chapter 1".to_string(),
            content: "draft text".to_string(),
            completed: false,
            beat: "opening".to_string(),
        }]
    }

    #[test]
    fn test_put_get_remove_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SledSnapshotStore::open(dir.path().join("test.sled")).unwrap();
        let story_id = Uuid::new_v4();

        let snapshot = ChapterSnapshot::now(chapters());
        store.put(&story_id, &snapshot).unwrap();

        let loaded = store.get(&story_id).unwrap().unwrap();
        assert_eq!(loaded.schema_version, snapshot.schema_version);
        assert_eq!(loaded.saved_at_ms, snapshot.saved_at_ms);
        assert_eq!(loaded.chapters, snapshot.chapters);

        store.remove(&story_id).unwrap();
        assert!(store.get(&story_id).unwrap().is_none());
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let dir = tempdir().unwrap();
        let store = SledSnapshotStore::open(dir.path().join("test.sled")).unwrap();
        assert!(store.get(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sled");
        let story_id = Uuid::new_v4();

        {
            let store = SledSnapshotStore::open(&path).unwrap();
            store.put(&story_id, &ChapterSnapshot::now(chapters())).unwrap();
            store.flush().unwrap();
        }

        // 模拟进程重启: 重新打开数据库后快照仍在
        let store = SledSnapshotStore::open(&path).unwrap();
        let loaded = store.get(&story_id).unwrap().unwrap();
        assert_eq!(loaded.chapters[0].content, "draft text");
    }

    #[test]
    fn test_unknown_schema_version_rejected() {
        let dir = tempdir().unwrap();
        let store = SledSnapshotStore::open(dir.path().join("test.sled")).unwrap();
        let story_id = Uuid::new_v4();

        let mut snapshot = ChapterSnapshot::now(chapters());
        snapshot.schema_version = SNAPSHOT_SCHEMA_VERSION + 1;
        store.put(&story_id, &snapshot).unwrap();

        assert!(matches!(
            store.get(&story_id),
            Err(SnapshotError::SchemaMismatch { found }) if found == SNAPSHOT_SCHEMA_VERSION + 1
        ));
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let dir = tempdir().unwrap();
        let store = SledSnapshotStore::open(dir.path().join("test.sled")).unwrap();
        let story_id = Uuid::new_v4();

        store.put(&story_id, &ChapterSnapshot::now(chapters())).unwrap();
        let mut newer = chapters();
        newer[0].content = "newer draft".to_string();
        store.put(&story_id, &ChapterSnapshot::now(newer)).unwrap();

        let loaded = store.get(&story_id).unwrap().unwrap();
        assert_eq!(loaded.chapters[0].content, "newer draft");
    }
}
