//! Fake Generator - 测试与离线演示用的生成器
//!
//! 不访问网络，按脚本返回固定文本；流式把文本按词切成增量并
//! 加入少量延迟，模拟真实流的到达节奏。

use async_stream::stream;
use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::{
    DeltaStream, GenerationError, GenerationRequest, ProviderKind, TextGeneratorPort,
};

/// Fake Generator 配置
#[derive(Debug, Clone)]
pub struct FakeGeneratorConfig {
    /// 固定返回的文本
    pub text: String,
    /// 每个增量之间的延迟（毫秒）
    pub delta_delay_ms: u64,
}

impl Default for FakeGeneratorConfig {
    fn default() -> Self {
        Self {
            text: "Once upon a time, in a land far away, a story began to unfold."
                .to_string(),
            delta_delay_ms: 20,
        }
    }
}

/// Fake Generator
pub struct FakeGenerator {
    config: FakeGeneratorConfig,
}

impl FakeGenerator {
    pub fn new(config: FakeGeneratorConfig) -> Self {
        tracing::info!(
            text_len = config.text.len(),
            "FakeGenerator initialized (no provider calls will be made)"
        );
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeGeneratorConfig::default())
    }
}

#[async_trait]
impl TextGeneratorPort for FakeGenerator {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    async fn complete(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "FakeGenerator: returning fixed text"
        );
        tokio::time::sleep(Duration::from_millis(self.config.delta_delay_ms)).await;
        Ok(self.config.text.clone())
    }

    async fn stream(&self, _request: GenerationRequest) -> Result<DeltaStream, GenerationError> {
        let text = self.config.text.clone();
        let delay = Duration::from_millis(self.config.delta_delay_ms);

        let deltas = stream! {
            let mut rest = text.as_str();
            while !rest.is_empty() {
                // 按下一个词边界切增量（保留词后空白）
                let cut = rest
                    .char_indices()
                    .skip_while(|(_, c)| c.is_whitespace())
                    .find(|(_, c)| c.is_whitespace())
                    .map(|(i, _)| i + 1)
                    .unwrap_or(rest.len());
                let (delta, remaining) = rest.split_at(cut);
                rest = remaining;
                yield Ok(delta.to_string());
                tokio::time::sleep(delay).await;
            }
        };

        Ok(Box::pin(deltas))
    }
}
