//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `SCRIBEL_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `SCRIBEL_SERVER__PORT=8080`
/// - `SCRIBEL_PROVIDER__KIND=gemini`
/// - `SCRIBEL_PROVIDER__API_KEY=...`
/// - `SCRIBEL_DATABASE__PATH=/data/scribel.db`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5090)?
        .set_default("provider.kind", "openrouter")?
        .set_default("provider.api_key", "")?
        .set_default("provider.model", "anthropic/claude-sonnet-4")?
        .set_default("provider.timeout_secs", 300)?
        .set_default("generation.temperature", 0.9)?
        .set_default("generation.word_threshold", 400)?
        .set_default("generation.context_char_budget", 24_000)?
        .set_default("generation.reveal_words_per_sec", 40.0)?
        .set_default("outline.max_attempts", 5)?
        .set_default("outline.retry_delay_ms", 500)?
        .set_default("autosave.debounce_secs", 5)?
        .set_default("autosave.max_retries", 5)?
        .set_default("autosave.backoff_base_ms", 1_000)?
        .set_default("autosave.backoff_cap_ms", 30_000)?
        .set_default("database.path", "data/scribel.db")?
        .set_default("database.max_connections", 5)?
        .set_default("snapshot.path", "data/snapshots.sled")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 前缀: SCRIBEL_，层级分隔符: __ (双下划线)
    builder = builder.add_source(
        Environment::with_prefix("SCRIBEL")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    match config.provider.kind.as_str() {
        "openrouter" | "gemini" | "fake" => {}
        other => {
            return Err(ConfigError::ValidationError(format!(
                "Unknown provider kind: {} (expected openrouter, gemini or fake)",
                other
            )));
        }
    }

    // 凭证缺失在 Provider 工厂 fail-fast，这里只拦住明显无效的组合
    if config.provider.kind != "fake" && config.provider.model.is_empty() {
        return Err(ConfigError::ValidationError(
            "Provider model cannot be empty".to_string(),
        ));
    }

    if config.database.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Database path cannot be empty".to_string(),
        ));
    }

    if config.generation.reveal_words_per_sec <= 0.0 {
        return Err(ConfigError::ValidationError(
            "Reveal rate must be positive".to_string(),
        ));
    }

    if config.autosave.debounce_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Autosave debounce cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Provider: {} ({})", config.provider.kind, config.provider.model);
    tracing::info!("Generation word threshold: {}", config.generation.word_threshold);
    tracing::info!("Reveal rate: {} words/s", config.generation.reveal_words_per_sec);
    tracing::info!("Autosave debounce: {}s", config.autosave.debounce_secs);
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Snapshot store: {:?}", config.snapshot.path);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
