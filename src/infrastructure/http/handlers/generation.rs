//! Generation HTTP Handlers
//!
//! 开始/取消生成会话与分块润色。开始生成立即返回 token，
//! 增量经编辑面 WebSocket 推送。

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::{
    CancelGenerationCommand, RefineChapterCommand, SessionKind, StartGenerationCommand,
};
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartGenerationRequest {
    pub story_id: Uuid,
    /// 编辑面标识（同一面上最多一个活动会话）
    pub surface: String,
    pub kind: SessionKind,
    pub chapter_index: usize,
    /// 修订类会话的用户指示
    pub instructions: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartGenerationResponse {
    pub surface: String,
    pub epoch: u64,
    pub story_id: Uuid,
    pub chapter_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct CancelGenerationRequest {
    pub surface: String,
}

#[derive(Debug, Serialize)]
pub struct CancelGenerationResponse {
    pub cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct RefineChapterRequest {
    pub story_id: Uuid,
    pub chapter_index: usize,
    pub style_instruction: String,
}

#[derive(Debug, Serialize)]
pub struct RefineChapterResponse {
    pub story_id: Uuid,
    pub chapter_index: usize,
    pub content: String,
    pub rewritten_sections: usize,
    pub fallback_sections: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// 开始生成会话（立即返回，增量经 WS 推送）
pub async fn start_generation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartGenerationRequest>,
) -> Result<Json<ApiResponse<StartGenerationResponse>>, ApiError> {
    let command = StartGenerationCommand {
        story_id: req.story_id,
        surface: req.surface,
        kind: req.kind,
        chapter_index: req.chapter_index,
        instructions: req.instructions,
    };

    let result = state.start_generation_handler.handle(command).await?;

    Ok(Json(ApiResponse::success(StartGenerationResponse {
        surface: result.token.surface,
        epoch: result.token.epoch,
        story_id: result.story_id,
        chapter_index: result.chapter_index,
    })))
}

/// 取消生成（协作式: 仅使 token 失效，不中断底层流）
pub async fn cancel_generation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancelGenerationRequest>,
) -> Result<Json<ApiResponse<CancelGenerationResponse>>, ApiError> {
    let result = state
        .cancel_generation_handler
        .handle(CancelGenerationCommand {
            surface: req.surface,
        });

    Ok(Json(ApiResponse::success(CancelGenerationResponse {
        cancelled: result.cancelled,
    })))
}

/// 分块润色章节（同步完成，逐段进度经全局 WS 推送）
pub async fn refine_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefineChapterRequest>,
) -> Result<Json<ApiResponse<RefineChapterResponse>>, ApiError> {
    let command = RefineChapterCommand {
        story_id: req.story_id,
        chapter_index: req.chapter_index,
        style_instruction: req.style_instruction,
    };

    let result = state.refine_chapter_handler.handle(command).await?;

    Ok(Json(ApiResponse::success(RefineChapterResponse {
        story_id: result.story_id,
        chapter_index: result.chapter_index,
        content: result.content,
        rewritten_sections: result.rewritten_sections,
        fallback_sections: result.fallback_sections,
    })))
}
