//! 基础设施层 - 端口的具体实现
//!
//! - adapters: 文本生成 Provider 适配器（OpenRouter / Gemini / Fake）
//! - events: WebSocket 事件发布
//! - http: RESTful API + WebSocket
//! - memory: 内存实现（会话管理）
//! - persistence: SQLite 仓储 + sled 快照存储
//! - worker: 后台自动保存 Worker

pub mod adapters;
pub mod events;
pub mod http;
pub mod memory;
pub mod persistence;
pub mod worker;
