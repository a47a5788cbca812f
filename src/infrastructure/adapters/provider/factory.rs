//! Provider Factory
//!
//! 按配置构造具体 Provider。凭证缺失或模型名不合法在这里 fail-fast，
//! 不会带病进入任何生成请求。

use std::sync::Arc;

use super::gemini_client::{GeminiClient, GeminiConfig};
use super::model::{format_model, validate_model};
use super::openrouter_client::{OpenRouterClient, OpenRouterConfig};
use crate::application::ports::{GenerationError, ProviderKind, TextGeneratorPort};

/// Provider 配置（来自配置文件/环境变量）
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: String,
    /// 留空使用 Provider 默认端点
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenRouter,
            api_key: String::new(),
            model: String::new(),
            base_url: None,
            timeout_secs: 300,
        }
    }
}

/// Provider 工厂
pub struct ProviderFactory;

impl ProviderFactory {
    /// 构造 Provider 并返回规范化后的模型名
    pub fn create(
        config: &ProviderConfig,
    ) -> Result<(Arc<dyn TextGeneratorPort>, String), GenerationError> {
        let model = format_model(config.kind, &config.model);
        validate_model(config.kind, &model)?;

        let generator: Arc<dyn TextGeneratorPort> = match config.kind {
            ProviderKind::OpenRouter => {
                let mut client_config = OpenRouterConfig {
                    api_key: config.api_key.clone(),
                    timeout_secs: config.timeout_secs,
                    ..Default::default()
                };
                if let Some(base_url) = &config.base_url {
                    client_config.base_url = base_url.clone();
                }
                Arc::new(OpenRouterClient::new(client_config)?)
            }
            ProviderKind::Gemini => {
                let mut client_config = GeminiConfig {
                    api_key: config.api_key.clone(),
                    timeout_secs: config.timeout_secs,
                    ..Default::default()
                };
                if let Some(base_url) = &config.base_url {
                    client_config.base_url = base_url.clone();
                }
                Arc::new(GeminiClient::new(client_config)?)
            }
        };

        tracing::info!(
            provider = %config.kind,
            model = %model,
            "Text generation provider created"
        );
        Ok((generator, model))
    }
}
