//! HTTP handlers for thumbnail and video uploads.
//!
//! The multipart body is never buffered here: the file field is handed to
//! `UploadService` as a stream. The caller is authenticated and the record's
//! ownership checked before the first part is read.

use crate::{
    errors::{AppError, UploadError},
    models::video::Video,
    services::upload_service::AssetSlot,
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderMap, StatusCode, header},
};
use futures::TryStreamExt;
use std::io;
use uuid::Uuid;

/// `POST /api/thumbnail_upload/{video_id}` with form field `thumbnail`.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    upload(state, &video_id, &headers, multipart, AssetSlot::Thumbnail).await
}

/// `POST /api/video_upload/{video_id}` with form field `video`.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    upload(state, &video_id, &headers, multipart, AssetSlot::Video).await
}

async fn upload(
    state: AppState,
    raw_id: &str,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
    slot: AssetSlot,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(raw_id)?;
    let actor_id = state.auth.authenticate(headers)?;
    let video = state.uploads.authorize(video_id, actor_id).await?;
    let mut multipart = multipart.map_err(|e| UploadError::MalformedRequest(e.body_text()))?;
    let limit = state.uploads.limits().for_slot(slot);

    tracing::info!(%video_id, %actor_id, slot = slot.field_name(), "upload requested");

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(slot.field_name()) {
            continue;
        }

        // Raw header: unparseable values must still reach classification.
        let content_type = field
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let source = field.map_err(move |e| multipart_error(e, limit));
        let video = state
            .uploads
            .handle_upload(video, actor_id, slot, content_type.as_deref(), source)
            .await?;
        return Ok(Json(video));
    }

    Err(UploadError::MalformedRequest(format!("Missing {} file", slot.field_name())).into())
}

pub(crate) fn parse_video_id(raw: &str) -> Result<Uuid, UploadError> {
    Uuid::parse_str(raw).map_err(|_| UploadError::InvalidIdentifier(raw.to_string()))
}

/// The body-limit layer reports overflow as 413; everything else is either
/// a broken form or a failed read.
fn multipart_error(err: MultipartError, limit: u64) -> UploadError {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => UploadError::PayloadTooLarge { limit },
        StatusCode::BAD_REQUEST => UploadError::MalformedRequest(format!(
            "Error parsing multipart form: {}",
            err.body_text()
        )),
        _ => UploadError::Io(io::Error::other(err.body_text())),
    }
}
