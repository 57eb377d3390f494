use super::{StorageBackend, StoredLocator};
use crate::{
    errors::UploadResult,
    services::{keys::StorageKey, media_type::AssetPolicy, staging::StagedPayload},
};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    time::Instant,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};

/// Flat directory of `<key>.<ext>` files served under `/assets`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    base_url: String,
}

impl LocalBackend {
    /// * `root` - directory the files are written to; must already exist
    /// * `base_url` - public origin, e.g. `http://localhost:8091`
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/assets/{}", self.base_url, file_name)
    }

    async fn write(&self, staged: &StagedPayload, path: &Path) -> UploadResult<u64> {
        let mut reader = staged.reader().await?;
        let mut file = File::create(path).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn persist(
        &self,
        staged: &StagedPayload,
        key: &StorageKey,
        _policy: &AssetPolicy,
    ) -> UploadResult<StoredLocator> {
        let file_name = key.file_name();
        let path = self.root.join(&file_name);
        let start = Instant::now();

        let written = match self.write(staged, &path).await {
            Ok(written) => written,
            Err(err) => {
                // Never leave a half-written asset reachable under /assets.
                let _ = fs::remove_file(&path).await;
                tracing::error!(error = %err, path = %path.display(), "local asset write failed");
                return Err(err);
            }
        };

        tracing::info!(
            path = %path.display(),
            key = %file_name,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local asset write successful"
        );

        Ok(StoredLocator::new(self.url_for(&file_name)))
    }
}
