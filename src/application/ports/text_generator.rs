//! Text Generator Port - 文本生成服务抽象
//!
//! 定义对外部文本生成 Provider 的抽象接口，具体实现在
//! infrastructure/adapters/provider 层

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

/// Provider 种类（两个可互换后端）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI 兼容聚合网关，模型名需要厂商命名空间（vendor/model）
    OpenRouter,
    /// Google Gemini 直连
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 文本生成错误
///
/// Configuration 对触发动作是致命的，绝不重试；
/// 其余按 is_transient 判定是否进入有界退避重试。
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Stream fault: {0}")]
    Stream(String),
}

impl GenerationError {
    /// 是否为瞬态错误（可有界重试）
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Network(_)
            | GenerationError::Timeout
            | GenerationError::RateLimited(_)
            | GenerationError::Stream(_) => true,
            GenerationError::Service { status, .. } => *status >= 500,
            GenerationError::Configuration(_) | GenerationError::InvalidResponse(_) => false,
        }
    }
}

/// 对话角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// 对话消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// 文本生成请求
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// 模型标识（已经过 format_model 规范化）
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.9,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// 增量文本流（每项为一个 delta）
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Text Generator Port
///
/// 外部文本生成服务的抽象接口
#[async_trait]
pub trait TextGeneratorPort: Send + Sync {
    /// Provider 种类
    fn kind(&self) -> ProviderKind;

    /// 单次完成（非流式）
    async fn complete(&self, request: GenerationRequest) -> Result<String, GenerationError>;

    /// 流式生成，返回增量文本序列
    async fn stream(&self, request: GenerationRequest) -> Result<DeltaStream, GenerationError>;

    /// 检查服务是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::Timeout.is_transient());
        assert!(GenerationError::Network("reset".into()).is_transient());
        assert!(GenerationError::RateLimited("429".into()).is_transient());
        assert!(GenerationError::Service {
            status: 503,
            message: "overloaded".into()
        }
        .is_transient());

        assert!(!GenerationError::Configuration("no key".into()).is_transient());
        assert!(!GenerationError::Service {
            status: 400,
            message: "bad model".into()
        }
        .is_transient());
    }
}
