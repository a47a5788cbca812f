//! Story HTTP Handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::{
    ChapterState, CreateStoryCommand, FixedChoice, GetStory, ListStories, RecoveryChoice,
    SnapshotInfo,
};
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateStoryRequest {
    pub title: String,
    pub premise: String,
    pub owner_id: String,
    #[serde(default = "default_min_chapters")]
    pub min_chapters: usize,
    #[serde(default = "default_max_chapters")]
    pub max_chapters: usize,
    /// 续作时指向前作
    pub parent_id: Option<Uuid>,
}

fn default_min_chapters() -> usize {
    6
}

fn default_max_chapters() -> usize {
    12
}

#[derive(Debug, Serialize)]
pub struct CreateStoryResponse {
    pub id: Uuid,
    pub title: String,
    pub beats: Vec<String>,
    pub characters: String,
}

#[derive(Debug, Deserialize)]
pub struct GetStoryRequest {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListStoriesRequest {
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteStoryRequest {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SaveStateResponse {
    pub pending_changes: bool,
    pub last_synced_at: Option<String>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoryResponse {
    pub id: Uuid,
    pub title: String,
    pub premise: String,
    pub beats: Vec<String>,
    pub characters: String,
    pub chapters: Vec<ChapterState>,
    pub parent_id: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
    pub last_synced_at: Option<String>,
    pub save_state: SaveStateResponse,
    /// 比后端更新的本地快照（编辑面应提示恢复/丢弃）
    pub recoverable_snapshot: Option<SnapshotInfo>,
}

#[derive(Debug, Serialize)]
pub struct StorySummaryResponse {
    pub id: Uuid,
    pub title: String,
    pub premise: String,
    pub chapter_count: usize,
    pub completed_count: usize,
    pub parent_id: Option<Uuid>,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveChaptersRequest {
    pub story_id: Uuid,
    pub chapters: Vec<ChapterState>,
}

#[derive(Debug, Deserialize)]
pub struct RecoverRequest {
    pub story_id: Uuid,
    /// true 采纳本地快照，false 丢弃并保留后端版本
    pub accept: bool,
}

#[derive(Debug, Serialize)]
pub struct RecoverResponse {
    pub story_id: Uuid,
    pub recovered: bool,
    pub chapters: Vec<ChapterState>,
}

// ============================================================================
// Handlers
// ============================================================================

/// 创建故事（大纲合成 + 人物表 + 章节播种）
pub async fn create_story(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStoryRequest>,
) -> Result<Json<ApiResponse<CreateStoryResponse>>, ApiError> {
    let command = CreateStoryCommand {
        title: req.title,
        premise: req.premise,
        owner_id: req.owner_id,
        min_chapters: req.min_chapters,
        max_chapters: req.max_chapters,
        parent_id: req.parent_id,
    };

    let result = state.create_story_handler.handle(command).await?;

    Ok(Json(ApiResponse::success(CreateStoryResponse {
        id: result.id,
        title: result.title,
        beats: result.beats,
        characters: result.characters,
    })))
}

/// 获取故事详情（含保存状态与可恢复快照探测）
pub async fn get_story(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GetStoryRequest>,
) -> Result<Json<ApiResponse<StoryResponse>>, ApiError> {
    let view = state
        .get_story_handler
        .handle(GetStory { story_id: req.id })
        .await?;

    let record = view.record;
    Ok(Json(ApiResponse::success(StoryResponse {
        id: record.id,
        title: record.title,
        premise: record.premise,
        beats: record.beats,
        characters: record.characters,
        chapters: record.chapters,
        parent_id: record.parent_id,
        created_at: record.created_at.to_rfc3339(),
        updated_at: record.updated_at.to_rfc3339(),
        last_synced_at: record.last_synced_at.map(|t| t.to_rfc3339()),
        save_state: SaveStateResponse {
            pending_changes: view.save_state.pending_changes,
            last_synced_at: view.save_state.last_synced_at.map(|t| t.to_rfc3339()),
            retry_count: view.save_state.retry_count,
            last_error: view.save_state.last_error,
        },
        recoverable_snapshot: view.recoverable_snapshot,
    })))
}

/// 获取故事列表
pub async fn list_stories(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ListStoriesRequest>,
) -> Result<Json<ApiResponse<Vec<StorySummaryResponse>>>, ApiError> {
    let summaries = state
        .list_stories_handler
        .handle(ListStories {
            owner_id: req.owner_id,
        })
        .await?;

    let responses = summaries
        .into_iter()
        .map(|s| StorySummaryResponse {
            id: s.id,
            title: s.title,
            premise: s.premise,
            chapter_count: s.chapter_count,
            completed_count: s.completed_count,
            parent_id: s.parent_id,
            updated_at: s.updated_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(ApiResponse::success(responses)))
}

/// 删除故事（连同本地快照）
pub async fn delete_story(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteStoryRequest>,
) -> Result<Json<ApiResponse<crate::infrastructure::http::dto::Empty>>, ApiError> {
    state.story_repo.delete(req.id).await?;
    if let Err(e) = state.snapshot_store.remove(&req.id) {
        tracing::warn!(story_id = %req.id, error = %e, "Snapshot cleanup failed on delete");
    }

    tracing::info!(story_id = %req.id, "Story deleted");
    Ok(Json(ApiResponse::ok()))
}

/// 保存章节（写入 WAL 快照并进入去抖同步）
pub async fn save_chapters(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveChaptersRequest>,
) -> Result<Json<ApiResponse<SaveStateResponse>>, ApiError> {
    state
        .story_repo
        .find_by_id(req.story_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Story not found: {}", req.story_id)))?;

    state.autosave.record_edit(req.story_id, req.chapters);

    let save_state = state.autosave.save_state(&req.story_id);
    state.event_publisher.publish_save_state(
        req.story_id,
        save_state.pending_changes,
        save_state.last_synced_at,
        save_state.retry_count,
    );

    Ok(Json(ApiResponse::success(SaveStateResponse {
        pending_changes: save_state.pending_changes,
        last_synced_at: save_state.last_synced_at.map(|t| t.to_rfc3339()),
        retry_count: save_state.retry_count,
        last_error: save_state.last_error,
    })))
}

/// 提交快照恢复决定（采纳或丢弃）
pub async fn recover_story(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecoverRequest>,
) -> Result<Json<ApiResponse<RecoverResponse>>, ApiError> {
    let choice = if req.accept {
        RecoveryChoice::Recover
    } else {
        RecoveryChoice::Discard
    };

    let outcome = state
        .autosave
        .load_with_recovery(req.story_id, &FixedChoice(choice))
        .await?;

    Ok(Json(ApiResponse::success(RecoverResponse {
        story_id: req.story_id,
        recovered: outcome.recovered,
        chapters: outcome.record.chapters,
    })))
}
