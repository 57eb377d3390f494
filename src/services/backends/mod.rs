//! Storage backends that turn a staged payload into a durable locator.
//!
//! Which backend serves which asset class is decided once at startup:
//! thumbnails go to [`LocalBackend`] or [`InlineBackend`], videos always go
//! to [`S3Backend`].

use crate::{
    errors::UploadResult,
    services::{
        keys::{KeyEncoding, StorageKey},
        media_type::AssetPolicy,
        staging::StagedPayload,
    },
};
use async_trait::async_trait;

pub mod inline;
pub mod local;
pub mod s3;

pub use inline::InlineBackend;
pub use local::LocalBackend;
pub use s3::S3Backend;

/// An addressable string for persisted bytes: an HTTP(S) URL or a `data:` URI.
///
/// Created once per successful persist and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLocator(String);

impl StoredLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// How keys for this backend should be rendered.
    fn key_encoding(&self) -> KeyEncoding {
        KeyEncoding::Base64Url
    }

    /// Persist `staged` under `key` and return where it can be found.
    async fn persist(
        &self,
        staged: &StagedPayload,
        key: &StorageKey,
        policy: &AssetPolicy,
    ) -> UploadResult<StoredLocator>;
}
