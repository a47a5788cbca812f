//! OpenRouter Client - OpenAI 兼容聚合网关
//!
//! 非流式走 chat/completions JSON；流式走同一端点的 SSE，
//! 增量从 choices[0].delta.content 提取，[DONE] 哨兵收尾。

use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::sse::{parse_data_lines_without_done, SseBuffer};
use crate::application::ports::{
    ChatMessage, DeltaStream, GenerationError, GenerationRequest, ProviderKind, TextGeneratorPort,
};

/// OpenRouter 客户端配置
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenRouter 客户端
pub struct OpenRouterClient {
    client: Client,
    /// 预先拼好的 Authorization 头
    auth_header: String,
    chat_url: String,
}

impl OpenRouterClient {
    pub fn new(config: OpenRouterConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::Configuration(
                "OpenRouter API key not set".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            client,
            auth_header: format!("Bearer {}", config.api_key),
            chat_url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    async fn send(
        &self,
        request: &GenerationRequest,
        stream: bool,
    ) -> Result<reqwest::Response, GenerationError> {
        let body = ChatCompletionsRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };

        tracing::debug!(
            url = %self.chat_url,
            model = %request.model,
            messages = request.messages.len(),
            stream,
            "Sending chat completions request"
        );

        let response = self
            .client
            .post(&self.chat_url)
            .header("Authorization", &self.auth_header)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(map_status_error(status.as_u16(), message));
        }
        Ok(response)
    }
}

/// reqwest 错误到 GenerationError 的映射
fn map_request_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else if e.is_connect() {
        GenerationError::Network(format!("Cannot connect to provider: {e}"))
    } else {
        GenerationError::Network(e.to_string())
    }
}

fn map_status_error(status: u16, message: String) -> GenerationError {
    if status == 429 {
        GenerationError::RateLimited(message)
    } else {
        GenerationError::Service { status, message }
    }
}

#[async_trait]
impl TextGeneratorPort for OpenRouterClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    async fn complete(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let response = self.send(&request, false).await?;
        let parsed: ChatCompletionsResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                GenerationError::InvalidResponse("response contains no choices".to_string())
            })
    }

    async fn stream(&self, request: GenerationRequest) -> Result<DeltaStream, GenerationError> {
        let response = self.send(&request, true).await?;
        let mut bytes = response.bytes_stream();

        let deltas = stream! {
            let mut sse = SseBuffer::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(GenerationError::Stream(e.to_string()));
                        return;
                    }
                };
                sse.push_chunk(&chunk);

                while let Some(block) = sse.next_event_block() {
                    for data in parse_data_lines_without_done(&block) {
                        match serde_json::from_str::<StreamChunk>(data) {
                            Ok(parsed) => {
                                if let Some(content) = parsed
                                    .choices
                                    .into_iter()
                                    .next()
                                    .and_then(|c| c.delta.content)
                                {
                                    if !content.is_empty() {
                                        yield Ok(content);
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Skipping unparseable SSE chunk");
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(deltas))
    }

    async fn health_check(&self) -> bool {
        // 轻量请求建立连接并验证凭证
        match self
            .client
            .get(format!(
                "{}/auth/key",
                self.chat_url.trim_end_matches("/chat/completions")
            ))
            .header("Authorization", &self.auth_header)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_rejected() {
        let result = OpenRouterClient::new(OpenRouterConfig::default());
        assert!(matches!(result, Err(GenerationError::Configuration(_))));
    }

    #[test]
    fn test_stream_chunk_parsing() {
        let data = r#"{"choices":[{"delta":{"content":"Once"}}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Once"));

        // 结束帧的 delta 为空对象
        let data = r#"{"choices":[{"delta":{}}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status_error(429, "slow down".into()),
            GenerationError::RateLimited(_)
        ));
        assert!(map_status_error(503, "overloaded".into()).is_transient());
        assert!(!map_status_error(400, "bad request".into()).is_transient());
    }
}
