//! Gemini Client - Google Gemini 直连
//!
//! generateContent 走 JSON；流式走 streamGenerateContent?alt=sse。
//! 对话消息映射到 Gemini 的 contents/systemInstruction 结构:
//! system 消息并入 systemInstruction，assistant 角色名为 "model"。

use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::sse::{parse_data_lines_without_done, SseBuffer};
use crate::application::ports::{
    ChatRole, DeltaStream, GenerationError, GenerationRequest, ProviderKind, TextGeneratorPort,
};

/// Gemini 客户端配置
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    fn text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let text: String = parts.into_iter().map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Gemini 客户端
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::Configuration(
                "Gemini API key not set".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, model: &str, method: &str, sse: bool) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let alt = if sse { "alt=sse&" } else { "" };
        format!(
            "{base}/models/{model}:{method}?{alt}key={}",
            self.config.api_key
        )
    }

    fn build_body(request: &GenerationRequest) -> GenerateContentRequest {
        let mut system_texts: Vec<String> = Vec::new();
        let mut contents: Vec<Content> = Vec::new();

        for message in &request.messages {
            match message.role {
                ChatRole::System => system_texts.push(message.content.clone()),
                ChatRole::User | ChatRole::Assistant => {
                    let role = match message.role {
                        ChatRole::Assistant => "model",
                        _ => "user",
                    };
                    contents.push(Content {
                        role: Some(role.to_string()),
                        parts: vec![Part {
                            text: message.content.clone(),
                        }],
                    });
                }
            }
        }

        GenerateContentRequest {
            contents,
            system_instruction: (!system_texts.is_empty()).then(|| SystemInstruction {
                parts: vec![Part {
                    text: system_texts.join("\n\n"),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    async fn send(&self, url: &str, body: &GenerateContentRequest) -> Result<reqwest::Response, GenerationError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else if e.is_connect() {
                    GenerationError::Network(format!("Cannot connect to provider: {e}"))
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 429 {
                GenerationError::RateLimited(message)
            } else {
                GenerationError::Service {
                    status: status.as_u16(),
                    message,
                }
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TextGeneratorPort for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn complete(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let url = self.url(&request.model, "generateContent", false);
        let body = Self::build_body(&request);

        tracing::debug!(model = %request.model, "Sending generateContent request");

        let response = self.send(&url, &body).await?;
        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        parsed.text().ok_or_else(|| {
            GenerationError::InvalidResponse("response contains no candidates".to_string())
        })
    }

    async fn stream(&self, request: GenerationRequest) -> Result<DeltaStream, GenerationError> {
        let url = self.url(&request.model, "streamGenerateContent", true);
        let body = Self::build_body(&request);

        tracing::debug!(model = %request.model, "Opening streamGenerateContent SSE");

        let response = self.send(&url, &body).await?;
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
                        match serde_json::from_str::<GenerateContentResponse>(data) {
                            Ok(parsed) => {
                                if let Some(text) = parsed.text() {
                                    yield Ok(text);
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
        let url = format!(
            "{}/models?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_key
        );
        match self
            .client
            .get(url)
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
    use crate::application::ports::ChatMessage;

    #[test]
    fn test_missing_api_key_rejected() {
        let result = GeminiClient::new(GeminiConfig::default());
        assert!(matches!(result, Err(GenerationError::Configuration(_))));
    }

    #[test]
    fn test_system_messages_fold_into_instruction() {
        let request = GenerationRequest::new(
            "gemini-2.0-flash",
            vec![
                ChatMessage::system("You are a novelist."),
                ChatMessage::user("Write chapter one."),
                ChatMessage::assistant("Here it is."),
            ],
        );

        let body = GeminiClient::build_body(&request);
        assert_eq!(body.contents.len(), 2);
        assert_eq!(body.contents[0].role.as_deref(), Some("user"));
        assert_eq!(body.contents[1].role.as_deref(), Some("model"));
        assert!(body
            .system_instruction
            .unwrap()
            .parts[0]
            .text
            .contains("novelist"));
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Once "},{"text":"upon"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Once upon"));

        let raw = r#"{"candidates":[]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.text().is_none());
    }
}
