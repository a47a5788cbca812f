//! Story Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("无效的标题: {0}")]
    InvalidTitle(String),

    #[error("无效的故事前提: {0}")]
    InvalidPremise(String),

    #[error("无效的大纲: {0}")]
    InvalidOutline(String),
}
