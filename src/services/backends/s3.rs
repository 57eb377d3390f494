use super::{StorageBackend, StoredLocator};
use crate::{
    errors::{UploadError, UploadResult},
    services::{
        keys::{KeyEncoding, StorageKey},
        media_type::AssetPolicy,
        staging::StagedPayload,
    },
};
use async_trait::async_trait;
use aws_config::{
    BehaviorVersion, Region, meta::region::RegionProviderChain, retry::RetryConfig,
};
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream};
use std::{io, time::Instant};

/// Remote object store reached through the S3 API.
///
/// One `PutObject` per upload with SDK retries disabled; a failed put fails
/// the request.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
    region: String,
    /// Custom endpoint for S3-compatible providers (MinIO and friends).
    endpoint_url: Option<String>,
}

impl S3Backend {
    /// Build a client from the default AWS credential chain.
    pub async fn connect(bucket: String, region: String, endpoint_url: Option<String>) -> Self {
        let region_provider = RegionProviderChain::first_try(Region::new(region.clone()));
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(RetryConfig::disabled())
            .load()
            .await;

        let mut conf = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint_url.as_deref() {
            conf = conf.endpoint_url(endpoint).force_path_style(true);
        }

        Self::with_client(Client::from_conf(conf.build()), bucket, region, endpoint_url)
    }

    fn with_client(
        client: Client,
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> Self {
        Self {
            client,
            bucket,
            region,
            endpoint_url,
        }
    }

    /// Virtual-hosted AWS URL, or path-style under a custom endpoint.
    fn object_url(&self, key: &str) -> String {
        object_url(&self.bucket, &self.region, self.endpoint_url.as_deref(), key)
    }
}

/// Spilled payloads are streamed from disk rather than loaded whole.
async fn request_body(staged: &StagedPayload) -> UploadResult<ByteStream> {
    match staged {
        StagedPayload::InMemory(bytes) => Ok(ByteStream::from(bytes.clone())),
        StagedPayload::Spilled { path, .. } => ByteStream::from_path(path)
            .await
            .map_err(|e| UploadError::Io(io::Error::other(e))),
    }
}

fn object_url(bucket: &str, region: &str, endpoint_url: Option<&str>, key: &str) -> String {
    match endpoint_url {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn key_encoding(&self) -> KeyEncoding {
        KeyEncoding::Hex
    }

    async fn persist(
        &self,
        staged: &StagedPayload,
        key: &StorageKey,
        policy: &AssetPolicy,
    ) -> UploadResult<StoredLocator> {
        let object_key = key.file_name();
        let size = staged.len();
        let body = request_body(staged).await?;

        let start = Instant::now();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(body)
            .content_type(&policy.media_type)
            .content_length(size as i64)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %object_key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                UploadError::UploadFailed(DisplayErrorContext(&e).to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %object_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(StoredLocator::new(self.object_url(&object_key)))
    }
}
