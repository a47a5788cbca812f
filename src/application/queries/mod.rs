//! 查询（CQRS 读侧）

pub mod handlers;
mod story_queries;

pub use story_queries::{GetStory, ListStories, SnapshotInfo, StorySummary, StoryView};
