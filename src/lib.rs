//! Scribel - 长篇小说写作助手的生成与持久化引擎
//!
//! 六边形架构:
//! - Domain: story/（聚合与值对象）、大纲防御式解析、散文分块
//! - Application: commands, queries, ports, autosave, reconcile, prompt, pacing
//! - Infrastructure: http, memory, worker, persistence, adapters, events

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
