//! In-Memory Session Manager Implementation
//!
//! 每个编辑面维护单调递增的 epoch。begin 总是成功并递增 epoch，
//! 因此同一面上最多一个 token 有效，最新会话隐式取代旧会话。

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::{
    ActiveSession, SessionKind, SessionManagerPort, SessionToken,
};

/// 每编辑面的会话槽
struct SurfaceSlot {
    /// 该面已签发的最大 epoch
    epoch: u64,
    /// 活动会话（finish 后为 None，epoch 保留）
    active: Option<ActiveSession>,
}

/// 内存会话管理器
pub struct InMemorySessionManager {
    surfaces: DashMap<String, SurfaceSlot>,
}

impl InMemorySessionManager {
    pub fn new() -> Self {
        Self {
            surfaces: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for InMemorySessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManagerPort for InMemorySessionManager {
    fn begin(
        &self,
        surface: &str,
        kind: SessionKind,
        story_id: Uuid,
        chapter_index: usize,
    ) -> SessionToken {
        let mut slot = self.surfaces.entry(surface.to_string()).or_insert(SurfaceSlot {
            epoch: 0,
            active: None,
        });
        slot.epoch += 1;

        let token = SessionToken {
            surface: surface.to_string(),
            epoch: slot.epoch,
        };
        let superseded = slot.active.is_some();
        slot.active = Some(ActiveSession {
            token: token.clone(),
            kind,
            story_id,
            chapter_index,
            started_at: Utc::now(),
        });

        tracing::info!(token = %token, kind = kind.as_str(), superseded, "Session began");
        token
    }

    fn is_current(&self, token: &SessionToken) -> bool {
        self.surfaces
            .get(&token.surface)
            .map(|slot| slot.epoch == token.epoch)
            .unwrap_or(false)
    }

    fn current(&self, surface: &str) -> Option<ActiveSession> {
        self.surfaces
            .get(surface)
            .and_then(|slot| slot.active.clone())
    }

    fn cancel(&self, surface: &str) -> bool {
        let Some(mut slot) = self.surfaces.get_mut(surface) else {
            return false;
        };
        if slot.active.is_none() {
            return false;
        }
        // 递增 epoch 使现有 token 失效；驱动任务在下一个恢复点自行退出
        slot.epoch += 1;
        slot.active = None;
        tracing::info!(surface = %surface, "Session cancelled");
        true
    }

    fn finish(&self, token: &SessionToken) {
        if let Some(mut slot) = self.surfaces.get_mut(&token.surface) {
            // 被取代的会话不允许清除接替者的状态
            if slot.epoch == token.epoch {
                slot.active = None;
                tracing::debug!(token = %token, "Session finished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin(manager: &InMemorySessionManager, surface: &str) -> SessionToken {
        manager.begin(surface, SessionKind::Write, Uuid::new_v4(), 0)
    }

    #[test]
    fn test_begin_supersedes_previous_token() {
        let manager = InMemorySessionManager::new();

        let first = begin(&manager, "editor");
        assert!(manager.is_current(&first));

        let second = begin(&manager, "editor");
        assert!(!manager.is_current(&first));
        assert!(manager.is_current(&second));
        assert!(second.epoch > first.epoch);
    }

    #[test]
    fn test_surfaces_are_independent() {
        let manager = InMemorySessionManager::new();

        let editor = begin(&manager, "editor");
        let sidebar = begin(&manager, "sidebar");

        assert!(manager.is_current(&editor));
        assert!(manager.is_current(&sidebar));
    }

    #[test]
    fn test_cancel_invalidates_without_new_session() {
        let manager = InMemorySessionManager::new();
        let token = begin(&manager, "editor");

        assert!(manager.cancel("editor"));
        assert!(!manager.is_current(&token));
        assert!(manager.current("editor").is_none());

        // 没有活动会话时取消是 no-op
        assert!(!manager.cancel("editor"));
        assert!(!manager.cancel("unknown"));
    }

    #[test]
    fn test_finish_only_clears_own_session() {
        let manager = InMemorySessionManager::new();
        let stale = begin(&manager, "editor");
        let current = begin(&manager, "editor");

        // 旧会话的 finish 不得清除接替者
        manager.finish(&stale);
        assert!(manager.current("editor").is_some());

        manager.finish(&current);
        assert!(manager.current("editor").is_none());
        // epoch 保留，旧 token 依然无效
        assert!(!manager.is_current(&stale));
    }

    #[test]
    fn test_current_reports_active_session() {
        let manager = InMemorySessionManager::new();
        let story_id = Uuid::new_v4();
        let token = manager.begin("editor", SessionKind::Revise, story_id, 3);

        let active = manager.current("editor").unwrap();
        assert_eq!(active.token, token);
        assert_eq!(active.kind, SessionKind::Revise);
        assert_eq!(active.story_id, story_id);
        assert_eq!(active.chapter_index, 3);
    }
}
