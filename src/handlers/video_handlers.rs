//! Record management: create a video and read it back.

use crate::{
    errors::{AppError, UploadError},
    handlers::upload_handlers::parse_video_id,
    models::video::{CreateVideoReq, Video},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};

/// `POST /api/videos`: create a video owned by the caller.
pub async fn create_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: Result<Json<CreateVideoReq>, JsonRejection>,
) -> Result<(StatusCode, Json<Video>), AppError> {
    let owner_id = state.auth.authenticate(&headers)?;
    let Json(req) = req.map_err(|e| UploadError::MalformedRequest(e.body_text()))?;
    let title = req.title.trim();
    if title.is_empty() {
        return Err(UploadError::MalformedRequest("Title must not be empty".into()).into());
    }

    let video = state
        .videos
        .create(owner_id, title, req.description.as_deref())
        .await?;
    tracing::info!(video_id = %video.id, %owner_id, "video created");
    Ok((StatusCode::CREATED, Json(video)))
}

/// `GET /api/videos/{video_id}`, owner only.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let actor_id = state.auth.authenticate(&headers)?;
    let video = state.videos.authorize(video_id, actor_id).await?;
    Ok(Json(video))
}
