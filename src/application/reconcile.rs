//! 本地快照对账
//!
//! 纯函数 `reconcile` 判定本地快照与后端哪份为权威；
//! 交互式恢复确认作为注入策略（RecoveryPrompt），
//! 而不是在对账逻辑里直接触碰环境。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 对账结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// 本地无快照，后端为权威
    NoSnapshot,
    /// 快照不比最近确认同步新，可安全丢弃
    SnapshotStale,
    /// 快照严格更新，需要用户决定恢复或丢弃
    SnapshotNewer,
}

/// 判定快照新旧
///
/// 快照仅在其时间戳严格晚于最近确认的后端同步时间时才是权威；
/// 从未同步过的故事，任何快照都视为更新。
pub fn reconcile(
    snapshot_saved_at_ms: Option<i64>,
    last_synced_at: Option<DateTime<Utc>>,
) -> Reconciliation {
    let Some(saved_at_ms) = snapshot_saved_at_ms else {
        return Reconciliation::NoSnapshot;
    };

    match last_synced_at {
        None => Reconciliation::SnapshotNewer,
        Some(synced) => {
            if saved_at_ms > synced.timestamp_millis() {
                Reconciliation::SnapshotNewer
            } else {
                Reconciliation::SnapshotStale
            }
        }
    }
}

/// 用户的恢复决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryChoice {
    /// 快照成为工作状态，并重新标记待同步
    Recover,
    /// 清除快照，后端为权威
    Discard,
}

/// 恢复确认策略（由调用方注入，编辑面实现为交互式对话框）
#[async_trait]
pub trait RecoveryPrompt: Send + Sync {
    async fn resolve(
        &self,
        story_id: &Uuid,
        snapshot_saved_at_ms: i64,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> RecoveryChoice;
}

/// 预先给定决定的策略（HTTP 层把编辑面的选择转交到这里）
pub struct FixedChoice(pub RecoveryChoice);

#[async_trait]
impl RecoveryPrompt for FixedChoice {
    async fn resolve(
        &self,
        _story_id: &Uuid,
        _snapshot_saved_at_ms: i64,
        _last_synced_at: Option<DateTime<Utc>>,
    ) -> RecoveryChoice {
        self.0
    }
}

/// 非交互环境的默认策略: 总是丢弃
pub struct AlwaysDiscard;

#[async_trait]
impl RecoveryPrompt for AlwaysDiscard {
    async fn resolve(
        &self,
        _story_id: &Uuid,
        _snapshot_saved_at_ms: i64,
        _last_synced_at: Option<DateTime<Utc>>,
    ) -> RecoveryChoice {
        RecoveryChoice::Discard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_no_snapshot() {
        assert_eq!(reconcile(None, None), Reconciliation::NoSnapshot);
        let synced = Utc.timestamp_millis_opt(1_000).unwrap();
        assert_eq!(reconcile(None, Some(synced)), Reconciliation::NoSnapshot);
    }

    #[test]
    fn test_snapshot_newer_when_never_synced() {
        assert_eq!(reconcile(Some(1_000), None), Reconciliation::SnapshotNewer);
    }

    #[test]
    fn test_strictly_newer_required() {
        let synced = Utc.timestamp_millis_opt(5_000).unwrap();

        assert_eq!(
            reconcile(Some(5_001), Some(synced)),
            Reconciliation::SnapshotNewer
        );
        // 相等不算更新
        assert_eq!(
            reconcile(Some(5_000), Some(synced)),
            Reconciliation::SnapshotStale
        );
        assert_eq!(
            reconcile(Some(4_999), Some(synced)),
            Reconciliation::SnapshotStale
        );
    }
}
