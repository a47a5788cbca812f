//! Story Context - Value Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoryError;

/// 故事唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryId(Uuid);

impl StoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 故事标题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title(String);

impl Title {
    pub fn new(title: impl Into<String>) -> Result<Self, StoryError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(StoryError::InvalidTitle("标题不能为空".to_string()));
        }
        if title.chars().count() > 200 {
            return Err(StoryError::InvalidTitle(
                "标题长度不能超过200字符".to_string(),
            ));
        }
        Ok(Self(title))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Title {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 故事前提（一句话到一段话的构想）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Premise(String);

impl Premise {
    pub fn new(premise: impl Into<String>) -> Result<Self, StoryError> {
        let premise = premise.into();
        if premise.trim().is_empty() {
            return Err(StoryError::InvalidPremise("故事前提不能为空".to_string()));
        }
        Ok(Self(premise))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Premise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_title_rejected() {
        assert!(matches!(Title::new("  "), Err(StoryError::InvalidTitle(_))));
    }

    #[test]
    fn test_overlong_title_rejected() {
        let long = "题".repeat(201);
        assert!(Title::new(long).is_err());
        assert!(Title::new("题".repeat(200)).is_ok());
    }

    #[test]
    fn test_blank_premise_rejected() {
        assert!(matches!(
            Premise::new(""),
            Err(StoryError::InvalidPremise(_))
        ));
    }
}
