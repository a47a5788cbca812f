//! Event Publisher Implementation
//!
//! WebSocket 事件推送实现
//!
//! 生成事件按编辑面（surface）路由，保存状态事件走全局广播。
//! 被取代会话的事件不会到达这里: 驱动循环在每个恢复点先做 token 判定。

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// WebSocket 事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WsEvent {
    /// 生成增量（按节拍揭示的文字）
    GenerationProgress {
        surface: String,
        epoch: u64,
        story_id: Uuid,
        chapter_index: usize,
        delta: String,
    },
    /// 生成完成
    GenerationCompleted {
        surface: String,
        epoch: u64,
        story_id: Uuid,
        chapter_index: usize,
        word_count: usize,
        completed: bool,
    },
    /// 生成失败（restored 表示章节已回退到会话前内容）
    GenerationFailed {
        surface: String,
        epoch: u64,
        story_id: Uuid,
        chapter_index: usize,
        error: String,
        restored: bool,
    },
    /// 保存状态变更
    SaveStateChanged {
        story_id: Uuid,
        pending_changes: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_synced_at: Option<chrono::DateTime<chrono::Utc>>,
        retry_count: u32,
    },
    /// 后端同步重试耗尽（本地快照仍然保留）
    SaveRetriesExhausted {
        story_id: Uuid,
        error: String,
    },
    /// 分块重写的单段完成
    SectionRewritten {
        story_id: Uuid,
        chapter_index: usize,
        section_index: usize,
        fallback: bool,
    },
}

/// 事件发布器
pub struct EventPublisher {
    /// surface -> broadcast sender（生成事件）
    surface_channels: DashMap<String, broadcast::Sender<WsEvent>>,
    /// 保存状态与重写进度的全局广播
    global_channel: broadcast::Sender<WsEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(256);
        Self {
            surface_channels: DashMap::new(),
            global_channel: global_tx,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全局事件（保存状态/重写进度）
    pub fn subscribe_global(&self) -> broadcast::Receiver<WsEvent> {
        self.global_channel.subscribe()
    }

    /// 注册编辑面的事件通道
    pub fn register_surface(&self, surface: &str) -> broadcast::Receiver<WsEvent> {
        if let Some(sender) = self.surface_channels.get(surface) {
            return sender.subscribe();
        }

        let (tx, rx) = broadcast::channel(256);
        self.surface_channels.insert(surface.to_string(), tx);
        rx
    }

    /// 取消注册编辑面
    pub fn unregister_surface(&self, surface: &str) {
        self.surface_channels.remove(surface);
    }

    /// 获取编辑面的事件接收器
    pub fn subscribe(&self, surface: &str) -> Option<broadcast::Receiver<WsEvent>> {
        self.surface_channels.get(surface).map(|s| s.subscribe())
    }

    /// 发布生成增量
    pub fn publish_progress(
        &self,
        surface: &str,
        epoch: u64,
        story_id: Uuid,
        chapter_index: usize,
        delta: &str,
    ) {
        self.publish_to_surface(
            surface,
            WsEvent::GenerationProgress {
                surface: surface.to_string(),
                epoch,
                story_id,
                chapter_index,
                delta: delta.to_string(),
            },
        );
    }

    /// 发布生成完成
    pub fn publish_generation_completed(
        &self,
        surface: &str,
        epoch: u64,
        story_id: Uuid,
        chapter_index: usize,
        word_count: usize,
        completed: bool,
    ) {
        self.publish_to_surface(
            surface,
            WsEvent::GenerationCompleted {
                surface: surface.to_string(),
                epoch,
                story_id,
                chapter_index,
                word_count,
                completed,
            },
        );
    }

    /// 发布生成失败
    pub fn publish_generation_failed(
        &self,
        surface: &str,
        epoch: u64,
        story_id: Uuid,
        chapter_index: usize,
        error: &str,
        restored: bool,
    ) {
        self.publish_to_surface(
            surface,
            WsEvent::GenerationFailed {
                surface: surface.to_string(),
                epoch,
                story_id,
                chapter_index,
                error: error.to_string(),
                restored,
            },
        );
    }

    /// 发布保存状态变更（全局广播）
    pub fn publish_save_state(
        &self,
        story_id: Uuid,
        pending_changes: bool,
        last_synced_at: Option<chrono::DateTime<chrono::Utc>>,
        retry_count: u32,
    ) {
        let event = WsEvent::SaveStateChanged {
            story_id,
            pending_changes,
            last_synced_at,
            retry_count,
        };
        if let Err(e) = self.global_channel.send(event) {
            tracing::debug!(
                story_id = %story_id,
                error = %e,
                "Failed to publish SaveStateChanged event (no receivers)"
            );
        }
    }

    /// 发布重试耗尽警告（全局广播）
    pub fn publish_save_retries_exhausted(&self, story_id: Uuid, error: &str) {
        let event = WsEvent::SaveRetriesExhausted {
            story_id,
            error: error.to_string(),
        };
        if let Err(e) = self.global_channel.send(event) {
            tracing::debug!(
                story_id = %story_id,
                error = %e,
                "Failed to publish SaveRetriesExhausted event (no receivers)"
            );
        }
    }

    /// 发布单段重写完成（全局广播）
    pub fn publish_section_rewritten(
        &self,
        story_id: Uuid,
        chapter_index: usize,
        section_index: usize,
        fallback: bool,
    ) {
        let event = WsEvent::SectionRewritten {
            story_id,
            chapter_index,
            section_index,
            fallback,
        };
        if let Err(e) = self.global_channel.send(event) {
            tracing::debug!(
                story_id = %story_id,
                error = %e,
                "Failed to publish SectionRewritten event (no receivers)"
            );
        }
    }

    /// 发布事件到指定编辑面
    fn publish_to_surface(&self, surface: &str, event: WsEvent) {
        if let Some(sender) = self.surface_channels.get(surface) {
            if let Err(e) = sender.send(event) {
                tracing::debug!(
                    surface = %surface,
                    error = %e,
                    "Failed to publish event (no receivers)"
                );
            }
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
