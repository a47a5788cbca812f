//! Generation Commands - 生成会话命令

use uuid::Uuid;

use crate::application::ports::{SessionKind, SessionToken};

/// 开始生成会话命令
///
/// 每次调用签发新 token，隐式取代该编辑面上的旧会话
#[derive(Debug, Clone)]
pub struct StartGenerationCommand {
    pub story_id: Uuid,
    /// 编辑面标识（同一面上最多一个活动会话）
    pub surface: String,
    pub kind: SessionKind,
    pub chapter_index: usize,
    /// 修订类会话的用户指示
    pub instructions: Option<String>,
}

/// 开始生成响应（立即返回，增量经 WebSocket 推送）
#[derive(Debug, Clone)]
pub struct StartGenerationResponse {
    pub token: SessionToken,
    pub story_id: Uuid,
    pub chapter_index: usize,
}

/// 取消生成命令（协作式，仅使 token 失效）
#[derive(Debug, Clone)]
pub struct CancelGenerationCommand {
    pub surface: String,
}

/// 取消生成响应
#[derive(Debug, Clone)]
pub struct CancelGenerationResponse {
    pub cancelled: bool,
}
