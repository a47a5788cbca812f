//! 文本生成 Provider 适配器
//!
//! TextGeneratorPort 的两个可互换实现（OpenRouter / Gemini），
//! 外加测试与演示用的 FakeGenerator。模型名在构造时规范化并校验，
//! 配置错误在进入任何请求前 fail-fast。

pub mod factory;
pub mod fake_generator;
pub mod gemini_client;
pub mod model;
pub mod openrouter_client;
mod sse;

pub use factory::{ProviderConfig, ProviderFactory};
pub use fake_generator::{FakeGenerator, FakeGeneratorConfig};
pub use gemini_client::{GeminiClient, GeminiConfig};
pub use model::{format_model, validate_model};
pub use openrouter_client::{OpenRouterClient, OpenRouterConfig};
