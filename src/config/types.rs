//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

/// 应用主配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 文本生成 Provider 配置
    #[serde(default)]
    pub provider: ProviderConfig,

    /// 生成节奏与上下文配置
    #[serde(default)]
    pub generation: GenerationConfig,

    /// 大纲合成配置
    #[serde(default)]
    pub outline: OutlineConfig,

    /// 自动保存配置
    #[serde(default)]
    pub autosave: AutosaveConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 本地快照存储配置
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5090
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 文本生成 Provider 配置
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Provider 种类: openrouter | gemini | fake
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// API 凭证（fake 不需要）
    #[serde(default)]
    pub api_key: String,

    /// 模型名（OpenRouter 裸名会自动补 vendor 前缀）
    #[serde(default = "default_model")]
    pub model: String,

    /// 留空使用 Provider 默认端点
    #[serde(default)]
    pub base_url: Option<String>,

    /// 请求超时时间（秒）
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_kind() -> String {
    "openrouter".to_string()
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_provider_timeout() -> u64 {
    300
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            api_key: String::new(),
            model: default_model(),
            base_url: None,
            timeout_secs: default_provider_timeout(),
        }
    }
}

/// 生成节奏与上下文配置
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// 采样温度
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// 章节视为完成的词数阈值
    #[serde(default = "default_word_threshold")]
    pub word_threshold: usize,

    /// 前文上下文的字符预算
    #[serde(default = "default_context_char_budget")]
    pub context_char_budget: usize,

    /// 逐词揭示速率（词/秒）
    #[serde(default = "default_reveal_words_per_sec")]
    pub reveal_words_per_sec: f64,
}

fn default_temperature() -> f64 {
    0.9
}

fn default_word_threshold() -> usize {
    400
}

fn default_context_char_budget() -> usize {
    24_000
}

fn default_reveal_words_per_sec() -> f64 {
    40.0
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            word_threshold: default_word_threshold(),
            context_char_budget: default_context_char_budget(),
            reveal_words_per_sec: default_reveal_words_per_sec(),
        }
    }
}

/// 大纲合成配置
#[derive(Debug, Clone, Deserialize)]
pub struct OutlineConfig {
    /// 整次调用的重试上限
    #[serde(default = "default_outline_max_attempts")]
    pub max_attempts: u32,

    /// 重试间隔（毫秒）
    #[serde(default = "default_outline_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_outline_max_attempts() -> u32 {
    5
}

fn default_outline_retry_delay_ms() -> u64 {
    500
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_outline_max_attempts(),
            retry_delay_ms: default_outline_retry_delay_ms(),
        }
    }
}

/// 自动保存配置
#[derive(Debug, Clone, Deserialize)]
pub struct AutosaveConfig {
    /// 去抖间隔（秒）
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    /// 退避重试上限
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 退避基数（毫秒）
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// 退避上限（毫秒）
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

fn default_debounce_secs() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/scribel.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 本地快照存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// sled 数据库目录
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("data/snapshots.sled")
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5090);
        assert_eq!(config.provider.kind, "openrouter");
        assert_eq!(config.generation.word_threshold, 400);
        assert_eq!(config.autosave.debounce_secs, 5);
        assert_eq!(config.database.path, "data/scribel.db");
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:5090");
    }

    #[test]
    fn test_database_url() {
        let config = DatabaseConfig::default();
        assert_eq!(config.database_url(), "sqlite:data/scribel.db?mode=rwc");
    }
}
