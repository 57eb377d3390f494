//! Maps declared MIME types onto the asset classes the service accepts.

use crate::errors::{UploadError, UploadResult};

/// Coarse category deciding limits, staging mode and backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Image,
    Video,
}

/// What the pipeline is allowed to do with an accepted content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPolicy {
    pub class: AssetClass,
    /// Normalized base type, e.g. `image/jpeg`. Parameters are dropped.
    pub media_type: String,
    /// File suffix appended to storage keys, without the dot.
    pub suffix: &'static str,
    /// Whether the payload may be embedded in the record as a data URL.
    pub inline_allowed: bool,
}

/// Classify a `Content-Type` value.
///
/// Only the base type is compared; anything after `;` is ignored and the
/// comparison is case-insensitive.
pub fn classify(declared: Option<&str>) -> UploadResult<AssetPolicy> {
    let media_type = declared
        .and_then(|value| value.split(';').next())
        .map(|base| base.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if media_type.is_empty() {
        return Err(UploadError::MissingContentType);
    }

    let (class, suffix) = match media_type.as_str() {
        "image/png" => (AssetClass::Image, "png"),
        "image/jpeg" | "image/jpg" => (AssetClass::Image, "jpg"),
        "video/mp4" => (AssetClass::Video, "mp4"),
        _ => return Err(UploadError::UnsupportedMediaType(media_type)),
    };

    Ok(AssetPolicy {
        class,
        media_type,
        suffix,
        inline_allowed: class == AssetClass::Image,
    })
}
