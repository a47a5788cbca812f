//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                  GET   健康检查
//! - /api/story/create          POST  创建故事（大纲合成 + 章节播种）
//! - /api/story/get             POST  获取故事详情（含可恢复快照探测）
//! - /api/story/list            POST  列出故事
//! - /api/story/delete          POST  删除故事
//! - /api/story/save            POST  保存章节（WAL + 去抖同步）
//! - /api/story/recover         POST  提交快照恢复决定
//! - /api/generation/start      POST  开始生成会话（增量经 WS 推送）
//! - /api/generation/cancel     POST  取消生成会话
//! - /api/generation/refine     POST  分块润色章节
//! - /ws/surface/{surface}      WS    编辑面 WebSocket（生成事件）
//! - /ws/events                 WS    全局 WebSocket（保存状态 / 重写进度）

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/surface/:surface", get(handlers::surface_websocket_handler))
        .route("/ws/events", get(handlers::global_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/story", story_routes())
        .nest("/generation", generation_routes())
}

/// Story 路由
fn story_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(handlers::create_story))
        .route("/get", post(handlers::get_story))
        .route("/list", post(handlers::list_stories))
        .route("/delete", post(handlers::delete_story))
        .route("/save", post(handlers::save_chapters))
        .route("/recover", post(handlers::recover_story))
}

/// Generation 路由
fn generation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start", post(handlers::start_generation))
        .route("/cancel", post(handlers::cancel_generation))
        .route("/refine", post(handlers::refine_chapter))
}
