//! HTTP Middleware
//!
//! 请求日志中间件: 4xx/5xx 响应记录日志，长耗时的同步接口单独告警。
//! 业务错误（errno != 0）在 ApiError::into_response() 中记录。

use std::time::{Duration, Instant};

use axum::{extract::Request, middleware::Next, response::Response};

/// 同步接口的慢请求阈值
///
/// 创建故事要等大纲合成（含重试），是这里最慢的同步调用；
/// 流式生成走 WebSocket 推送，不在此计时范围内。
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(30);

/// 请求日志中间件
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP client error"
        );
    } else if started.elapsed() >= SLOW_REQUEST_THRESHOLD {
        tracing::warn!(method = %method, path = %path, elapsed_ms, "Slow request");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        routing::post,
        Router,
    };
    use tower::util::ServiceExt;

    async fn created_handler() -> &'static str {
        "created"
    }

    async fn missing_story_handler() -> StatusCode {
        StatusCode::NOT_FOUND
    }

    async fn broken_handler() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn test_router() -> Router {
        Router::new()
            .route("/api/story/create", post(created_handler))
            .route("/api/story/get", post(missing_story_handler))
            .route("/api/story/list", post(broken_handler))
            .layer(axum::middleware::from_fn(request_logging_middleware))
    }

    async fn send(app: Router, path: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method("POST")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_ok_response_passes_through() {
        assert_eq!(send(test_router(), "/api/story/create").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_client_error_passes_through() {
        assert_eq!(
            send(test_router(), "/api/story/get").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_server_error_passes_through() {
        assert_eq!(
            send(test_router(), "/api/story/list").await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
