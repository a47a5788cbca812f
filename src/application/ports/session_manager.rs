//! Session Manager Port - 生成会话生命周期管理
//!
//! 定义会话 token 的签发与失效抽象，具体实现在 infrastructure/memory 层。
//!
//! 正确性依赖 token 比较而非显式停止:
//! - 每个编辑面（surface）同时最多一个有效会话
//! - begin 递增 epoch，旧 token 立即失效
//! - 被取代会话的输出在每个恢复点用 is_current 判定后静默丢弃

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 生成任务种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// 首次写作
    Write,
    /// 按指示修订
    Revise,
    /// 章节衔接段
    Transition,
    /// 分块润色重写
    Refine,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Write => "write",
            SessionKind::Revise => "revise",
            SessionKind::Transition => "transition",
            SessionKind::Refine => "refine",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "write" => Some(SessionKind::Write),
            "revise" => Some(SessionKind::Revise),
            "transition" => Some(SessionKind::Transition),
            "refine" => Some(SessionKind::Refine),
            _ => None,
        }
    }

    /// 失败/取消时是否需要恢复会话前内容
    pub fn restores_on_failure(&self) -> bool {
        matches!(self, SessionKind::Revise | SessionKind::Refine)
    }
}

/// 不透明会话 token
///
/// epoch 为每个 surface 单调递增的计数器；token 在异步调用链中
/// 逐层传递，每个恢复点与当前 epoch 比较。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub surface: String,
    pub epoch: u64,
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.surface, self.epoch)
    }
}

/// 活动会话信息（in-memory）
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub token: SessionToken,
    pub kind: SessionKind,
    pub story_id: Uuid,
    pub chapter_index: usize,
    pub started_at: DateTime<Utc>,
}

/// Session Manager Port
///
/// 管理每个编辑面的会话 epoch，所有状态存储在内存中
pub trait SessionManagerPort: Send + Sync {
    /// 开始新会话: 递增 epoch 并返回新 token（隐式取代旧会话）
    fn begin(
        &self,
        surface: &str,
        kind: SessionKind,
        story_id: Uuid,
        chapter_index: usize,
    ) -> SessionToken;

    /// token 是否仍是该 surface 的当前会话
    fn is_current(&self, token: &SessionToken) -> bool;

    /// 获取 surface 的活动会话
    fn current(&self, surface: &str) -> Option<ActiveSession>;

    /// 取消（协作式）: 递增 epoch 使现有 token 失效，不强制中止底层流
    ///
    /// 返回是否存在被取消的活动会话
    fn cancel(&self, surface: &str) -> bool;

    /// 正常结束: 仅当 token 仍为当前会话时清除活动状态
    fn finish(&self, token: &SessionToken);
}
