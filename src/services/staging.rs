//! Bounded staging of inbound upload bodies.
//!
//! Small assets are collected into one contiguous buffer. Large assets are
//! spilled to a temporary file that removes itself when the payload is
//! dropped, so every exit path (success, rejection, I/O failure) cleans up.

use crate::errors::{UploadError, UploadResult};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, pin_mut};
use std::{io::Cursor, path::PathBuf, pin::Pin};
use tempfile::TempPath;
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncWriteExt},
};

/// Where the staged bytes live until a backend persists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingMode {
    Memory,
    Spill,
}

/// Bytes read from the client, fully received and within the limit.
#[derive(Debug)]
pub enum StagedPayload {
    InMemory(Bytes),
    Spilled { path: TempPath, len: u64 },
}

impl StagedPayload {
    pub fn len(&self) -> u64 {
        match self {
            StagedPayload::InMemory(bytes) => bytes.len() as u64,
            StagedPayload::Spilled { len, .. } => *len,
        }
    }

    /// The contiguous buffer, if the payload was staged in memory.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            StagedPayload::InMemory(bytes) => Some(bytes),
            StagedPayload::Spilled { .. } => None,
        }
    }

    /// A fresh reader positioned at the first byte.
    pub async fn reader(&self) -> UploadResult<Pin<Box<dyn AsyncRead + Send + Sync>>> {
        match self {
            StagedPayload::InMemory(bytes) => Ok(Box::pin(Cursor::new(bytes.clone()))),
            StagedPayload::Spilled { path, .. } => Ok(Box::pin(File::open(path).await?)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamingStager {
    spill_dir: PathBuf,
}

impl StreamingStager {
    pub fn new(spill_dir: impl Into<PathBuf>) -> Self {
        Self {
            spill_dir: spill_dir.into(),
        }
    }

    /// Read `source` to the end, failing as soon as more than `limit` bytes arrive.
    pub async fn stage<S>(
        &self,
        source: S,
        limit: u64,
        mode: StagingMode,
    ) -> UploadResult<StagedPayload>
    where
        S: Stream<Item = UploadResult<Bytes>> + Send,
    {
        match mode {
            StagingMode::Memory => stage_in_memory(source, limit).await,
            StagingMode::Spill => self.stage_to_disk(source, limit).await,
        }
    }

    async fn stage_to_disk<S>(&self, source: S, limit: u64) -> UploadResult<StagedPayload>
    where
        S: Stream<Item = UploadResult<Bytes>> + Send,
    {
        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".part")
            .tempfile_in(&self.spill_dir)?
            .into_parts();
        // `path` deletes the file when dropped, including on the `?` returns below.
        let mut file = File::from_std(file);

        let mut len: u64 = 0;
        pin_mut!(source);
        while let Some(chunk) = source.next().await {
            let chunk = chunk?;
            len += chunk.len() as u64;
            if len > limit {
                return Err(UploadError::PayloadTooLarge { limit });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::debug!(path = %path.display(), size_bytes = len, "staged upload to disk");
        Ok(StagedPayload::Spilled { path, len })
    }
}

async fn stage_in_memory<S>(source: S, limit: u64) -> UploadResult<StagedPayload>
where
    S: Stream<Item = UploadResult<Bytes>> + Send,
{
    let mut buf = BytesMut::new();
    pin_mut!(source);
    while let Some(chunk) = source.next().await {
        let chunk = chunk?;
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(UploadError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(StagedPayload::InMemory(buf.freeze()))
}
