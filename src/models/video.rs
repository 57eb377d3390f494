//! Represents a video record that uploaded assets are attached to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A video owned by a single user.
///
/// The record exists before any upload. The upload pipeline is the only
/// writer of `thumbnail_url` and `video_url`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Video {
    /// Unique identifier, immutable.
    pub id: Uuid,

    /// ID of the user that owns this video, immutable.
    pub owner_id: Uuid,

    pub title: String,

    pub description: Option<String>,

    /// Locator of the thumbnail: an `/assets` URL or an inline `data:` URL.
    pub thumbnail_url: Option<String>,

    /// Locator of the video file in the object store.
    pub video_url: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Bumped on every metadata write.
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /api/videos`.
#[derive(Deserialize, Debug)]
pub struct CreateVideoReq {
    pub title: String,
    pub description: Option<String>,
}
