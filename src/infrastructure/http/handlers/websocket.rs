//! WebSocket Handlers
//!
//! 编辑面 WebSocket 承接生成事件（增量/完成/失败），
//! 全局 WebSocket 承接保存状态与重写进度。

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::infrastructure::events::WsEvent;
use crate::infrastructure::http::state::AppState;

/// 编辑面 WebSocket 连接处理（生成事件）
pub async fn surface_websocket_handler(
    ws: WebSocketUpgrade,
    Path(surface): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_surface_socket(socket, surface, state))
}

/// 全局 WebSocket 连接处理（保存状态 / 重写进度）
pub async fn global_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_global_socket(socket, state))
}

async fn handle_surface_socket(socket: WebSocket, surface: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // 注册编辑面事件通道
    let mut event_rx = state.event_publisher.register_surface(&surface);

    tracing::info!(surface = %surface, "Surface WebSocket connected");

    let surface_for_forward = surface.clone();
    let surface_for_receive = surface.clone();

    // 事件转发任务
    let forward_task = tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            let msg = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(
                    surface = %surface_for_forward,
                    error = %e,
                    "Failed to send WebSocket message"
                );
                break;
            }
        }
    });

    // 接收客户端消息（心跳/关闭）
    let receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::info!(surface = %surface_for_receive, "WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(surface = %surface_for_receive, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    // 等待任一任务完成
    tokio::select! {
        _ = forward_task => {}
        _ = receive_task => {}
    }

    // 清理通道；断线期间的会话仍靠 token 判定自然终止
    state.event_publisher.unregister_surface(&surface);
    tracing::info!(surface = %surface, "Surface WebSocket disconnected");
}

async fn handle_global_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut event_rx = state.event_publisher.subscribe_global();

    tracing::info!("Global WebSocket connected");

    let forward_task = tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            match &event {
                WsEvent::SaveStateChanged { .. }
                | WsEvent::SaveRetriesExhausted { .. }
                | WsEvent::SectionRewritten { .. } => {
                    let msg = match serde_json::to_string(&event) {
                        Ok(json) => Message::Text(json),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize event");
                            continue;
                        }
                    };

                    if let Err(e) = sender.send(msg).await {
                        tracing::debug!(error = %e, "Failed to send global WebSocket message");
                        break;
                    }
                }
                _ => {}
            }
        }
    });

    let receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::info!("Global WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Global WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = forward_task => {}
        _ = receive_task => {}
    }

    tracing::info!("Global WebSocket disconnected");
}
