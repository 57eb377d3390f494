use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Failures of the upload pipeline and its collaborators.
///
/// Every variant is terminal for the request; nothing is retried.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),
    #[error("missing or invalid credential: {0}")]
    MissingOrInvalidCredential(String),
    #[error("actor does not own this video")]
    Forbidden,
    #[error("video not found")]
    NotFound,
    #[error("missing content type")]
    MissingContentType,
    #[error("unsupported media type `{0}`")]
    UnsupportedMediaType(String),
    #[error("payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("upload to object store failed: {0}")]
    UploadFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::InvalidIdentifier(_)
            | UploadError::MissingContentType
            | UploadError::UnsupportedMediaType(_)
            | UploadError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            UploadError::MissingOrInvalidCredential(_) => StatusCode::UNAUTHORIZED,
            UploadError::Forbidden => StatusCode::FORBIDDEN,
            UploadError::NotFound => StatusCode::NOT_FOUND,
            UploadError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Io(_)
            | UploadError::UploadFailed(_)
            | UploadError::Internal(_)
            | UploadError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller. Server-side failures get a
    /// generic description; their details only go to the log.
    fn public_message(&self) -> String {
        match self {
            UploadError::InvalidIdentifier(_) => "Invalid ID".into(),
            UploadError::MissingOrInvalidCredential(_) => "Couldn't validate credentials".into(),
            UploadError::Forbidden => "You do not own this video".into(),
            UploadError::NotFound => "Video not found".into(),
            UploadError::MissingContentType => "Missing Content-Type".into(),
            UploadError::UnsupportedMediaType(media_type) => {
                format!("Unsupported media type `{}`", media_type)
            }
            UploadError::PayloadTooLarge { limit } => {
                format!("Payload exceeds the {} byte limit", limit)
            }
            UploadError::MalformedRequest(reason) => reason.clone(),
            UploadError::Io(_) => "Failed to store upload".into(),
            UploadError::UploadFailed(_) => "Failed to upload to object store".into(),
            UploadError::Internal(_) => "Internal server error".into(),
            UploadError::Database(_) => "Failed to access video metadata".into(),
        }
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::debug!(error = %err, status = status.as_u16(), "request rejected");
        }
        AppError::new(status, err.public_message())
    }
}
