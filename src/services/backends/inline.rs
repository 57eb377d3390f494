use super::{StorageBackend, StoredLocator};
use crate::{
    errors::{UploadError, UploadResult},
    services::{keys::StorageKey, media_type::AssetPolicy, staging::StagedPayload},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};

/// Embeds the whole payload in the locator as `data:<type>;base64,<payload>`.
///
/// Nothing is written anywhere; the record itself carries the bytes. The
/// key is ignored.
#[derive(Debug, Clone, Default)]
pub struct InlineBackend;

#[async_trait]
impl StorageBackend for InlineBackend {
    fn name(&self) -> &'static str {
        "inline"
    }

    async fn persist(
        &self,
        staged: &StagedPayload,
        _key: &StorageKey,
        policy: &AssetPolicy,
    ) -> UploadResult<StoredLocator> {
        if !policy.inline_allowed {
            return Err(UploadError::Internal(format!(
                "{} payloads cannot be embedded inline",
                policy.media_type
            )));
        }
        let bytes = staged.as_bytes().ok_or_else(|| {
            UploadError::Internal("inline embedding requires an in-memory payload".into())
        })?;

        let encoded = STANDARD.encode(bytes);
        tracing::debug!(
            size_bytes = bytes.len(),
            encoded_len = encoded.len(),
            "embedded asset inline"
        );
        Ok(StoredLocator::new(format!(
            "data:{};base64,{}",
            policy.media_type, encoded
        )))
    }
}
