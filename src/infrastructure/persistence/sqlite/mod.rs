//! SQLite 持久化

pub mod database;
pub mod story_repo;

pub use database::{create_pool, run_migrations, DatabaseConfig, DbPool};
pub use story_repo::SqliteStoryRepository;
