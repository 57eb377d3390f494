//! Defines the HTTP surface of the upload service.
//!
//! ## Structure
//! - `GET  /healthz`, `GET /readyz`: probes
//! - `POST /api/videos`: create a video record
//! - `GET  /api/videos/{video_id}`: fetch a record (owner only)
//! - `POST /api/thumbnail_upload/{video_id}`: multipart field `thumbnail`
//! - `POST /api/video_upload/{video_id}`: multipart field `video`
//! - `GET  /assets/*`: locally stored thumbnails

use crate::{
    config::AppConfig,
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::{upload_thumbnail, upload_video},
        video_handlers::{create_video, get_video},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 1 << 20;

/// Build the router. Body limits follow the configured staging limits so the
/// transport never cuts off an upload the stager would have accepted.
pub fn routes(cfg: &AppConfig) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/videos", post(create_video))
        .route("/api/videos/{video_id}", get(get_video))
        .route(
            "/api/thumbnail_upload/{video_id}",
            post(upload_thumbnail).layer(body_limit(cfg.thumbnail_max_bytes)),
        )
        .route(
            "/api/video_upload/{video_id}",
            post(upload_video).layer(body_limit(cfg.video_max_bytes)),
        )
        .nest_service("/assets", ServeDir::new(&cfg.assets_root))
        .layer(TraceLayer::new_for_http())
}

fn body_limit(max_file_bytes: u64) -> DefaultBodyLimit {
    let max = max_file_bytes.saturating_add(MULTIPART_OVERHEAD);
    DefaultBodyLimit::max(usize::try_from(max).unwrap_or(usize::MAX))
}
