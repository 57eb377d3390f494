use crate::{
    config::AppConfig,
    services::{auth::JwtValidator, upload_service::UploadService, video_store::VideoStore},
};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub videos: VideoStore,
    pub auth: JwtValidator,
    pub uploads: Arc<UploadService>,
}
