//! SQLite Story Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{
    ChapterState, RepositoryError, StoryRecord, StoryRepositoryPort,
};

/// SQLite Story Repository
pub struct SqliteStoryRepository {
    pool: DbPool,
}

impl SqliteStoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct StoryRow {
    id: String,
    title: String,
    premise: String,
    beats: String,
    characters: String,
    chapters: String,
    owner_id: String,
    parent_id: Option<String>,
    created_at: String,
    updated_at: String,
    last_synced_at: Option<String>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

impl TryFrom<StoryRow> for StoryRecord {
    type Error = RepositoryError;

    fn try_from(row: StoryRow) -> Result<Self, Self::Error> {
        let beats: Vec<String> = serde_json::from_str(&row.beats)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let chapters: Vec<ChapterState> = serde_json::from_str(&row.chapters)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

        Ok(StoryRecord {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| RepositoryError::SerializationError(e.to_string()))?,
            title: row.title,
            premise: row.premise,
            beats,
            characters: row.characters,
            chapters,
            owner_id: row.owner_id,
            parent_id: row
                .parent_id
                .map(|p| Uuid::parse_str(&p))
                .transpose()
                .map_err(|e| RepositoryError::SerializationError(e.to_string()))?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            last_synced_at: row
                .last_synced_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        })
    }
}

const STORY_COLUMNS: &str = "id, title, premise, beats, characters, chapters, owner_id, parent_id, created_at, updated_at, last_synced_at";

#[async_trait]
impl StoryRepositoryPort for SqliteStoryRepository {
    async fn save(&self, story: &StoryRecord) -> Result<(), RepositoryError> {
        let beats = serde_json::to_string(&story.beats)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let chapters = serde_json::to_string(&story.chapters)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO stories (id, title, premise, beats, characters, chapters, owner_id, parent_id, created_at, updated_at, last_synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                premise = excluded.premise,
                beats = excluded.beats,
                characters = excluded.characters,
                chapters = excluded.chapters,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(story.id.to_string())
        .bind(&story.title)
        .bind(&story.premise)
        .bind(beats)
        .bind(&story.characters)
        .bind(chapters)
        .bind(&story.owner_id)
        .bind(story.parent_id.map(|p| p.to_string()))
        .bind(story.created_at.to_rfc3339())
        .bind(story.updated_at.to_rfc3339())
        .bind(story.last_synced_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoryRecord>, RepositoryError> {
        let query = format!("SELECT {STORY_COLUMNS} FROM stories WHERE id = ?");
        let row: Option<StoryRow> = sqlx::query_as(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(StoryRecord::try_from).transpose()
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<StoryRecord>, RepositoryError> {
        let query =
            format!("SELECT {STORY_COLUMNS} FROM stories WHERE owner_id = ? ORDER BY updated_at DESC");
        let rows: Vec<StoryRow> = sqlx::query_as(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(StoryRecord::try_from).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM stories WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn update_chapters(
        &self,
        id: Uuid,
        chapters: &[ChapterState],
        synced_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let chapters_json = serde_json::to_string(chapters)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE stories
            SET chapters = ?, updated_at = ?, last_synced_at = ?
            WHERE id = ?
            "#,
        )
        .bind(chapters_json)
        .bind(synced_at.to_rfc3339())
        .bind(synced_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn last_synced_at(&self, id: Uuid) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT last_synced_at FROM stories WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        match row {
            Some((Some(raw),)) => Ok(Some(parse_timestamp(&raw)?)),
            _ => Ok(None),
        }
    }
}
