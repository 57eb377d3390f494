//! Metadata access for video records, backed by SQLite.
//!
//! The upload pipeline only needs `get` and `update`; `create` and `migrate`
//! exist for the record-management endpoints and for startup.

use crate::{
    errors::{UploadError, UploadResult},
    models::video::Video,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Clone)]
pub struct VideoStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl VideoStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema, one statement at a time.
    pub async fn migrate(&self) -> UploadResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        tracing::info!("Running {} migration statements...", statements.len());

        for stmt in statements {
            tracing::debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    pub async fn create(
        &self,
        owner_id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> UploadResult<Video> {
        let now = Utc::now();
        let video = sqlx::query_as::<_, Video>(
            r#"
            INSERT INTO videos (
                id, owner_id, title, description, thumbnail_url, video_url,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, NULL, NULL, ?, ?)
            RETURNING id, owner_id, title, description, thumbnail_url, video_url,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(title)
        .bind(description)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await?;
        Ok(video)
    }

    /// Fetch a video by id. Returns NotFound if missing.
    pub async fn get(&self, id: Uuid) -> UploadResult<Video> {
        sqlx::query_as::<_, Video>(
            "SELECT id, owner_id, title, description, thumbnail_url, video_url,
                    created_at, updated_at
             FROM videos WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => UploadError::NotFound,
            other => UploadError::Database(other),
        })
    }

    /// Write the mutable columns of `video` back and bump `updated_at`.
    ///
    /// Last writer wins: there is no version check.
    pub async fn update(&self, video: &mut Video) -> UploadResult<()> {
        video.updated_at = Utc::now();
        let result = sqlx::query(
            "UPDATE videos
             SET title = ?, description = ?, thumbnail_url = ?, video_url = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.updated_at)
        .bind(video.id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UploadError::NotFound);
        }
        Ok(())
    }

    /// Confirm `actor_id` owns the video and hand the record back for reuse.
    ///
    /// Performs exactly one lookup and no writes.
    pub async fn authorize(&self, video_id: Uuid, actor_id: Uuid) -> UploadResult<Video> {
        let video = self.get(video_id).await?;
        if video.owner_id != actor_id {
            return Err(UploadError::Forbidden);
        }
        Ok(video)
    }
}
