//! Domain Layer - 领域层
//!
//! 包含一个限界上下文:
//! - Story Context: 故事管理（前提、大纲、章节、人物）
//!
//! 以及两个共享的纯文本模块:
//! - outline_parser: 模型输出的大纲防御式解析（分层降级）
//! - prose_splitter: 对白/叙述分段（无损重组）

pub mod story;

// 共享的纯文本模块
mod outline_parser;
mod prose_splitter;

pub use outline_parser::{parse_outline, OutlineBounds, OutlineParse};
pub use prose_splitter::{join_sections, split_into_sections, Section, SectionKind};
