//! 模型名规范化与校验
//!
//! OpenRouter 的模型标识要求厂商命名空间（vendor/model），
//! 常见裸模型名在这里补全；校验在构造 Provider 时进行，
//! 明显配错的模型名不进入任何请求。

use crate::application::ports::{GenerationError, ProviderKind};

/// 按 Provider 规范化模型名
pub fn format_model(kind: ProviderKind, model: &str) -> String {
    let model = model.trim();
    match kind {
        ProviderKind::OpenRouter => {
            if model.contains('/') {
                return model.to_string();
            }
            // 常见裸模型名补全厂商前缀
            let vendor = if model.starts_with("gpt-") || model.starts_with("o1") {
                Some("openai")
            } else if model.starts_with("claude-") {
                Some("anthropic")
            } else if model.starts_with("gemini-") {
                Some("google")
            } else if model.starts_with("llama-") {
                Some("meta-llama")
            } else if model.starts_with("deepseek-") {
                Some("deepseek")
            } else {
                None
            };
            match vendor {
                Some(vendor) => format!("{vendor}/{model}"),
                None => model.to_string(),
            }
        }
        ProviderKind::Gemini => model.to_string(),
    }
}

/// 校验模型名是否形如该 Provider 的合法标识
pub fn validate_model(kind: ProviderKind, model: &str) -> Result<(), GenerationError> {
    if model.trim().is_empty() {
        return Err(GenerationError::Configuration(
            "model identifier is empty".to_string(),
        ));
    }

    match kind {
        ProviderKind::OpenRouter => {
            if !model.contains('/') {
                return Err(GenerationError::Configuration(format!(
                    "OpenRouter model '{model}' lacks vendor namespace (expected vendor/model)"
                )));
            }
        }
        ProviderKind::Gemini => {
            if !model.starts_with("gemini-") {
                return Err(GenerationError::Configuration(format!(
                    "Gemini model '{model}' does not look like a Gemini model identifier"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openrouter_bare_names_get_vendor() {
        assert_eq!(
            format_model(ProviderKind::OpenRouter, "gpt-4o"),
            "openai/gpt-4o"
        );
        assert_eq!(
            format_model(ProviderKind::OpenRouter, "claude-sonnet-4"),
            "anthropic/claude-sonnet-4"
        );
        assert_eq!(
            format_model(ProviderKind::OpenRouter, "gemini-2.0-flash"),
            "google/gemini-2.0-flash"
        );
    }

    #[test]
    fn test_namespaced_names_untouched() {
        assert_eq!(
            format_model(ProviderKind::OpenRouter, "mistralai/mixtral-8x7b"),
            "mistralai/mixtral-8x7b"
        );
        assert_eq!(
            format_model(ProviderKind::Gemini, "gemini-2.0-flash"),
            "gemini-2.0-flash"
        );
    }

    #[test]
    fn test_validate_fails_fast() {
        assert!(validate_model(ProviderKind::OpenRouter, "openai/gpt-4o").is_ok());
        assert!(validate_model(ProviderKind::OpenRouter, "gpt4o-nonsense").is_err());
        assert!(validate_model(ProviderKind::Gemini, "gemini-2.0-flash").is_ok());
        assert!(validate_model(ProviderKind::Gemini, "gpt-4o").is_err());
        assert!(validate_model(ProviderKind::Gemini, "  ").is_err());
    }
}
