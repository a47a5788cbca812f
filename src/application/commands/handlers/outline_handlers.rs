//! Outline Handlers - 大纲合成
//!
//! 一次提示词请求 -> 防御式解析 -> 数量校验，整体有界重试。
//! 解析内部的降级（结构化/字段恢复/启发式）由 domain::parse_outline 吸收，
//! 这里只处理两类失败: 解析彻底失败、数量越界 —— 都重试整次合成。

use std::sync::Arc;
use std::time::Duration;

use crate::application::commands::{CreateOutlineCommand, CreateOutlineResponse};
use crate::application::error::ApplicationError;
use crate::application::ports::{GenerationRequest, TextGeneratorPort};
use crate::application::prompt;
use crate::domain::{parse_outline, OutlineBounds, OutlineParse};

/// 合成器参数
#[derive(Debug, Clone)]
pub struct SynthesizerSettings {
    pub model: String,
    pub temperature: f32,
    /// 整次合成的重试上限
    pub max_attempts: u32,
    /// 重试间隔
    pub retry_delay: Duration,
}

impl Default for SynthesizerSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.9,
            max_attempts: 5,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// 大纲合成器
pub struct OutlineSynthesizer {
    generator: Arc<dyn TextGeneratorPort>,
    settings: SynthesizerSettings,
}

impl OutlineSynthesizer {
    pub fn new(generator: Arc<dyn TextGeneratorPort>, settings: SynthesizerSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    /// 合成章节大纲
    ///
    /// 返回的节拍数量保证落在 [min,max] 内；重试耗尽则返回错误而不是
    /// 越界结果。
    pub async fn synthesize(
        &self,
        command: CreateOutlineCommand,
    ) -> Result<CreateOutlineResponse, ApplicationError> {
        if command.min_chapters == 0 || command.min_chapters > command.max_chapters {
            return Err(ApplicationError::validation(format!(
                "无效的章节数量边界: [{}, {}]",
                command.min_chapters, command.max_chapters
            )));
        }

        let bounds = OutlineBounds::new(command.min_chapters, command.max_chapters);
        let messages = prompt::outline_messages(
            &command.premise,
            command.min_chapters,
            command.max_chapters,
        );

        let mut last_failure = String::from("no attempt made");

        for attempt in 1..=self.settings.max_attempts {
            let request = GenerationRequest::new(&self.settings.model, messages.clone())
                .with_temperature(self.settings.temperature);

            let raw = match self.generator.complete(request).await {
                Ok(raw) => raw,
                Err(e) if e.is_transient() => {
                    tracing::warn!(attempt, error = %e, "Outline request failed, retrying");
                    last_failure = e.to_string();
                    tokio::time::sleep(self.settings.retry_delay).await;
                    continue;
                }
                // 配置类错误对本次动作致命，立即浮出
                Err(e) => return Err(e.into()),
            };

            let parsed = parse_outline(&raw, &bounds);
            let tier = match &parsed {
                OutlineParse::Parsed(_) => "parsed",
                OutlineParse::FieldRecovered(_) => "field_recovered",
                OutlineParse::HeuristicSegmented(_) => "heuristic",
                OutlineParse::Failed => {
                    tracing::warn!(attempt, "Outline output unparseable, retrying");
                    last_failure = "model output unparseable".to_string();
                    tokio::time::sleep(self.settings.retry_delay).await;
                    continue;
                }
            };

            let beats = parsed.into_beats().expect("non-failed parse has beats");
            if !bounds.contains(beats.len()) {
                tracing::warn!(
                    attempt,
                    count = beats.len(),
                    min = bounds.min,
                    max = bounds.max,
                    "Outline count out of bounds, retrying"
                );
                last_failure = format!(
                    "outline count {} outside [{}, {}]",
                    beats.len(),
                    bounds.min,
                    bounds.max
                );
                tokio::time::sleep(self.settings.retry_delay).await;
                continue;
            }

            tracing::info!(attempt, chapters = beats.len(), tier, "Outline synthesized");
            return Ok(CreateOutlineResponse {
                beats,
                parse_tier: tier,
                attempts: attempt,
            });
        }

        Err(ApplicationError::MalformedOutput(format!(
            "outline synthesis exhausted {} attempts: {}",
            self.settings.max_attempts, last_failure
        )))
    }

    /// 生成人物表（随大纲一起播种故事）
    pub async fn generate_characters(
        &self,
        premise: &str,
        beats: &[String],
    ) -> Result<String, ApplicationError> {
        let request = GenerationRequest::new(
            &self.settings.model,
            prompt::characters_messages(premise, beats),
        )
        .with_temperature(self.settings.temperature);

        let roster = self.generator.complete(request).await?;
        Ok(roster.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{DeltaStream, GenerationError, ProviderKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 按脚本依次返回响应的生成器
    struct ScriptedGenerator {
        responses: Mutex<Vec<Result<String, GenerationError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TextGeneratorPort for ScriptedGenerator {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenRouter
        }

        async fn complete(
            &self,
            _request: GenerationRequest,
        ) -> Result<String, GenerationError> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(GenerationError::Network("script exhausted".into()))
            } else {
                responses.remove(0)
            }
        }

        async fn stream(
            &self,
            _request: GenerationRequest,
        ) -> Result<DeltaStream, GenerationError> {
            unimplemented!("not used in outline tests")
        }
    }

    fn settings() -> SynthesizerSettings {
        SynthesizerSettings {
            model: "test-model".into(),
            retry_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn command(min: usize, max: usize) -> CreateOutlineCommand {
        CreateOutlineCommand {
            premise: "premise".into(),
            min_chapters: min,
            max_chapters: max,
        }
    }

    #[tokio::test]
    async fn test_valid_outline_first_attempt() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            r#"["beat one", "beat two", "beat three"]"#.to_string(),
        )]));
        let synthesizer = OutlineSynthesizer::new(generator.clone(), settings());

        let response = synthesizer.synthesize(command(2, 5)).await.unwrap();
        assert_eq!(response.beats.len(), 3);
        assert_eq!(response.attempts, 1);
        assert_eq!(response.parse_tier, "parsed");
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_out_of_bounds_retries_whole_call() {
        // 第一次只有 1 条（低于下限），第二次合格
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(r#"["only one"]"#.to_string()),
            Ok(r#"["one", "two", "three"]"#.to_string()),
        ]));
        let synthesizer = OutlineSynthesizer::new(generator.clone(), settings());

        let response = synthesizer.synthesize(command(2, 5)).await.unwrap();
        assert_eq!(response.beats.len(), 3);
        assert_eq!(response.attempts, 2);
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_never_returns_out_of_bounds() {
        // 所有尝试都越界 => 错误而不是无限循环或越界结果
        let responses = (0..5)
            .map(|_| Ok(r#"["only one"]"#.to_string()))
            .collect();
        let generator = Arc::new(ScriptedGenerator::new(responses));
        let synthesizer = OutlineSynthesizer::new(generator.clone(), settings());

        let result = synthesizer.synthesize(command(3, 6)).await;
        assert!(matches!(result, Err(ApplicationError::MalformedOutput(_))));
        assert_eq!(generator.call_count(), 5);
    }

    #[tokio::test]
    async fn test_transient_error_retried_configuration_not() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(GenerationError::Timeout),
            Ok(r#"["one", "two"]"#.to_string()),
        ]));
        let synthesizer = OutlineSynthesizer::new(generator, settings());
        let response = synthesizer.synthesize(command(2, 5)).await.unwrap();
        assert_eq!(response.attempts, 2);

        let generator = Arc::new(ScriptedGenerator::new(vec![Err(
            GenerationError::Configuration("missing key".into()),
        )]));
        let synthesizer = OutlineSynthesizer::new(generator.clone(), settings());
        let result = synthesizer.synthesize(command(2, 5)).await;
        assert!(matches!(
            result,
            Err(ApplicationError::ConfigurationError(_))
        ));
        // 配置错误不重试
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_bounds_rejected_upfront() {
        let generator = Arc::new(ScriptedGenerator::new(vec![]));
        let synthesizer = OutlineSynthesizer::new(generator.clone(), settings());
        assert!(synthesizer.synthesize(command(0, 5)).await.is_err());
        assert!(synthesizer.synthesize(command(6, 5)).await.is_err());
        assert_eq!(generator.call_count(), 0);
    }
}
