//! Story Context - 故事限界上下文
//!
//! 职责:
//! - 故事聚合管理
//! - 章节实体（完成度规则）
//! - 大纲节拍与人物表

mod aggregate;
mod entities;
mod errors;
mod value_objects;

pub use aggregate::Story;
pub use entities::Chapter;
pub use errors::StoryError;
pub use value_objects::{Premise, StoryId, Title};
