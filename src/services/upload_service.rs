//! The ingestion pipeline behind both upload endpoints.
//!
//! authorize → classify → stage → generate key → persist → write locator.
//! Authorization is a separate call so the HTTP layer can run it before
//! touching the request body. Each step short-circuits on failure. Nothing is
//! rolled back beyond the stager's own temp-file cleanup, and the record is
//! only touched after the backend reported success.

use crate::{
    errors::{UploadError, UploadResult},
    models::video::Video,
    services::{
        backends::StorageBackend,
        keys,
        media_type::{self, AssetClass},
        staging::{StagingMode, StreamingStager},
        video_store::VideoStore,
    },
};
use bytes::Bytes;
use futures::Stream;
use std::{sync::Arc, time::Instant};
use uuid::Uuid;

/// Which locator of the record an upload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSlot {
    Thumbnail,
    Video,
}

impl AssetSlot {
    /// Multipart form field carrying the file.
    pub fn field_name(self) -> &'static str {
        match self {
            AssetSlot::Thumbnail => "thumbnail",
            AssetSlot::Video => "video",
        }
    }

    fn class(self) -> AssetClass {
        match self {
            AssetSlot::Thumbnail => AssetClass::Image,
            AssetSlot::Video => AssetClass::Video,
        }
    }

    /// Thumbnails are small and may need to be base64-encoded whole; videos
    /// must never be held in memory.
    fn staging_mode(self) -> StagingMode {
        match self {
            AssetSlot::Thumbnail => StagingMode::Memory,
            AssetSlot::Video => StagingMode::Spill,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub thumbnail_max_bytes: u64,
    pub video_max_bytes: u64,
}

impl UploadLimits {
    pub fn for_slot(&self, slot: AssetSlot) -> u64 {
        match slot {
            AssetSlot::Thumbnail => self.thumbnail_max_bytes,
            AssetSlot::Video => self.video_max_bytes,
        }
    }
}

pub struct UploadService {
    videos: VideoStore,
    stager: StreamingStager,
    thumbnails: Arc<dyn StorageBackend>,
    video_files: Arc<dyn StorageBackend>,
    limits: UploadLimits,
}

impl UploadService {
    pub fn new(
        videos: VideoStore,
        stager: StreamingStager,
        thumbnails: Arc<dyn StorageBackend>,
        video_files: Arc<dyn StorageBackend>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            videos,
            stager,
            thumbnails,
            video_files,
            limits,
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    fn backend(&self, slot: AssetSlot) -> &dyn StorageBackend {
        match slot {
            AssetSlot::Thumbnail => self.thumbnails.as_ref(),
            AssetSlot::Video => self.video_files.as_ref(),
        }
    }

    /// Load the target record and check that `actor_id` owns it.
    pub async fn authorize(&self, video_id: Uuid, actor_id: Uuid) -> UploadResult<Video> {
        self.videos.authorize(video_id, actor_id).await
    }

    /// Run the rest of the pipeline against a record returned by
    /// [`UploadService::authorize`] and return the updated record.
    pub async fn handle_upload<S>(
        &self,
        mut video: Video,
        actor_id: Uuid,
        slot: AssetSlot,
        content_type: Option<&str>,
        source: S,
    ) -> UploadResult<Video>
    where
        S: Stream<Item = UploadResult<Bytes>> + Send,
    {
        let policy = media_type::classify(content_type)?;
        if policy.class != slot.class() {
            return Err(UploadError::UnsupportedMediaType(policy.media_type));
        }

        let start = Instant::now();
        let limit = self.limits.for_slot(slot);
        let staged = self.stager.stage(source, limit, slot.staging_mode()).await?;

        let backend = self.backend(slot);
        let key = keys::generate(&policy, backend.key_encoding())?;
        let locator = backend.persist(&staged, &key, &policy).await?;
        // The spill file (if any) is no longer needed once the backend has the bytes.
        drop(staged);

        match slot {
            AssetSlot::Thumbnail => video.thumbnail_url = Some(locator.into_string()),
            AssetSlot::Video => video.video_url = Some(locator.into_string()),
        }
        self.videos.update(&mut video).await?;

        tracing::info!(
            video_id = %video.id,
            %actor_id,
            slot = slot.field_name(),
            backend = backend.name(),
            key = %key,
            media_type = %policy.media_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "upload stored"
        );

        Ok(video)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::{
        backends::{InlineBackend, LocalBackend, StoredLocator},
        keys::{KeyEncoding, StorageKey},
        media_type::AssetPolicy,
        staging::StagedPayload,
        video_store::tests::memory_store,
    };
    use async_trait::async_trait;
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use futures::stream;
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    };
    use tempfile::{TempDir, tempdir};
    use tokio::io::AsyncReadExt;

    /// Object-store stand-in that records each put.
    #[derive(Default)]
    pub(crate) struct RecordingStore {
        pub puts: Mutex<Vec<RecordedPut>>,
        pub fail: bool,
    }

    #[derive(Debug, Clone)]
    pub(crate) struct RecordedPut {
        pub key: String,
        pub media_type: String,
        pub body: Vec<u8>,
        pub spilled: bool,
    }

    #[async_trait]
    impl StorageBackend for RecordingStore {
        fn name(&self) -> &'static str {
            "recording"
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
            if self.fail {
                return Err(UploadError::UploadFailed("SlowDown".into()));
            }
            let mut body = Vec::new();
            staged.reader().await?.read_to_end(&mut body).await?;
            self.puts.lock().unwrap().push(RecordedPut {
                key: key.file_name(),
                media_type: policy.media_type.clone(),
                body,
                spilled: staged.as_bytes().is_none(),
            });
            Ok(StoredLocator::new(format!(
                "https://media-bucket.s3.us-east-1.amazonaws.com/{}",
                key.file_name()
            )))
        }
    }

    struct Fixture {
        service: UploadService,
        store: VideoStore,
        remote: Arc<RecordingStore>,
        assets: TempDir,
        spill: TempDir,
    }

    const LIMITS: UploadLimits = UploadLimits {
        thumbnail_max_bytes: 64 * 1024,
        video_max_bytes: 1024 * 1024,
    };

    async fn fixture(inline: bool, remote: RecordingStore) -> Fixture {
        let store = memory_store().await;
        let assets = tempdir().unwrap();
        let spill = tempdir().unwrap();
        let remote = Arc::new(remote);
        let thumbnails: Arc<dyn StorageBackend> = if inline {
            Arc::new(InlineBackend)
        } else {
            Arc::new(LocalBackend::new(assets.path(), "http://localhost:8091"))
        };
        let service = UploadService::new(
            store.clone(),
            StreamingStager::new(spill.path()),
            thumbnails,
            remote.clone(),
            LIMITS,
        );
        Fixture {
            service,
            store,
            remote,
            assets,
            spill,
        }
    }

    impl UploadService {
        /// Authorize then upload, the way the HTTP handlers drive it.
        async fn upload_as<S>(
            &self,
            video_id: Uuid,
            actor_id: Uuid,
            slot: AssetSlot,
            content_type: Option<&str>,
            source: S,
        ) -> UploadResult<Video>
        where
            S: Stream<Item = UploadResult<Bytes>> + Send,
        {
            let video = self.authorize(video_id, actor_id).await?;
            self.handle_upload(video, actor_id, slot, content_type, source).await
        }
    }

    /// A byte source that notes whether anyone ever read from it.
    fn tracked(
        data: Vec<u8>,
        polled: Arc<AtomicBool>,
    ) -> impl Stream<Item = UploadResult<Bytes>> + Send {
        stream::once(async move {
            polled.store(true, Ordering::SeqCst);
            Ok(Bytes::from(data))
        })
    }

    fn png(len: usize) -> Vec<u8> {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.resize(len, 0xAB);
        data
    }

    fn entries(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn owner_thumbnail_lands_on_disk_and_in_record() {
        let fx = fixture(false, RecordingStore::default()).await;
        let owner = Uuid::new_v4();
        let video = fx.store.create(owner, "intro", None).await.unwrap();
        let data = png(2048);

        let updated = fx
            .service
            .upload_as(
                video.id,
                owner,
                AssetSlot::Thumbnail,
                Some("image/png"),
                stream::iter(vec![Ok(Bytes::from(data.clone()))]),
            )
            .await
            .unwrap();

        let url = updated.thumbnail_url.clone().unwrap();
        let file_name = url
            .strip_prefix("http://localhost:8091/assets/")
            .expect("assets url");
        assert!(file_name.ends_with(".png"));
        let on_disk = std::fs::read(fx.assets.path().join(file_name)).unwrap();
        assert_eq!(on_disk.len(), 2048);
        assert_eq!(on_disk, data);

        let stored = fx.store.get(video.id).await.unwrap();
        assert_eq!(stored.thumbnail_url, Some(url));
        assert!(stored.video_url.is_none());
    }

    #[tokio::test]
    async fn non_owner_is_rejected_without_side_effects() {
        let fx = fixture(false, RecordingStore::default()).await;
        let owner = Uuid::new_v4();
        let video = fx.store.create(owner, "intro", None).await.unwrap();
        let polled = Arc::new(AtomicBool::new(false));

        let err = fx
            .service
            .upload_as(
                video.id,
                Uuid::new_v4(),
                AssetSlot::Thumbnail,
                Some("image/png"),
                tracked(png(2048), polled.clone()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Forbidden));
        assert!(!polled.load(Ordering::SeqCst));
        assert_eq!(entries(&fx.assets), 0);
        assert_eq!(entries(&fx.spill), 0);
        assert_eq!(fx.store.get(video.id).await.unwrap(), video);
    }

    #[tokio::test]
    async fn unknown_video_is_not_found() {
        let fx = fixture(false, RecordingStore::default()).await;
        let polled = Arc::new(AtomicBool::new(false));

        let err = fx
            .service
            .upload_as(
                Uuid::new_v4(),
                Uuid::new_v4(),
                AssetSlot::Video,
                Some("video/mp4"),
                tracked(vec![0; 16], polled.clone()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::NotFound));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn gif_is_rejected_before_staging() {
        let fx = fixture(false, RecordingStore::default()).await;
        let owner = Uuid::new_v4();
        let video = fx.store.create(owner, "intro", None).await.unwrap();
        let polled = Arc::new(AtomicBool::new(false));

        let err = fx
            .service
            .upload_as(
                video.id,
                owner,
                AssetSlot::Thumbnail,
                Some("image/gif"),
                tracked(vec![0x47; 64], polled.clone()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::UnsupportedMediaType(t) if t == "image/gif"));
        assert!(!polled.load(Ordering::SeqCst));
        assert_eq!(entries(&fx.assets), 0);
        assert!(fx.store.get(video.id).await.unwrap().thumbnail_url.is_none());
    }

    #[tokio::test]
    async fn type_must_match_the_slot() {
        let fx = fixture(false, RecordingStore::default()).await;
        let owner = Uuid::new_v4();
        let video = fx.store.create(owner, "intro", None).await.unwrap();

        let err = fx
            .service
            .upload_as(
                video.id,
                owner,
                AssetSlot::Thumbnail,
                Some("video/mp4"),
                stream::iter(vec![Ok(Bytes::from_static(b"mp4"))]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedMediaType(_)));

        let err = fx
            .service
            .upload_as(
                video.id,
                owner,
                AssetSlot::Video,
                Some("image/png"),
                stream::iter(vec![Ok(Bytes::from_static(b"png"))]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedMediaType(_)));
        assert!(fx.remote.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_content_type_is_reported() {
        let fx = fixture(false, RecordingStore::default()).await;
        let owner = Uuid::new_v4();
        let video = fx.store.create(owner, "intro", None).await.unwrap();

        let err = fx
            .service
            .upload_as(
                video.id,
                owner,
                AssetSlot::Thumbnail,
                None,
                stream::iter(vec![Ok(Bytes::from_static(b"png"))]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MissingContentType));
    }

    #[tokio::test]
    async fn oversized_thumbnail_leaves_record_untouched() {
        let fx = fixture(false, RecordingStore::default()).await;
        let owner = Uuid::new_v4();
        let video = fx.store.create(owner, "intro", None).await.unwrap();

        let err = fx
            .service
            .upload_as(
                video.id,
                owner,
                AssetSlot::Thumbnail,
                Some("image/jpeg"),
                stream::iter(vec![Ok(Bytes::from(vec![0u8; 64 * 1024 + 1]))]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::PayloadTooLarge { limit } if limit == 64 * 1024));
        assert_eq!(entries(&fx.assets), 0);
        assert_eq!(fx.store.get(video.id).await.unwrap(), video);
    }

    #[tokio::test]
    async fn video_is_spilled_and_sent_to_the_object_store() {
        let fx = fixture(false, RecordingStore::default()).await;
        let owner = Uuid::new_v4();
        let video = fx.store.create(owner, "intro", None).await.unwrap();
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 13) as u8).collect();
        let chunks: Vec<UploadResult<Bytes>> = data
            .chunks(8192)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let updated = fx
            .service
            .upload_as(
                video.id,
                owner,
                AssetSlot::Video,
                Some("video/mp4"),
                stream::iter(chunks),
            )
            .await
            .unwrap();

        let puts = fx.remote.puts.lock().unwrap().clone();
        assert_eq!(puts.len(), 1);
        let put = &puts[0];
        assert!(put.spilled);
        assert_eq!(put.media_type, "video/mp4");
        assert_eq!(put.body, data);
        let token = put.key.strip_suffix(".mp4").unwrap();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(
            updated.video_url.as_deref(),
            Some(format!("https://media-bucket.s3.us-east-1.amazonaws.com/{}", put.key).as_str())
        );
        assert_eq!(fx.store.get(video.id).await.unwrap().video_url, updated.video_url);
        // staging file is gone once the request finished
        assert_eq!(entries(&fx.spill), 0);
    }

    #[tokio::test]
    async fn failed_put_keeps_previous_locator() {
        let fx = fixture(
            false,
            RecordingStore {
                fail: true,
                ..Default::default()
            },
        )
        .await;
        let owner = Uuid::new_v4();
        let mut video = fx.store.create(owner, "intro", None).await.unwrap();
        video.video_url = Some("https://media-bucket.s3.us-east-1.amazonaws.com/old.mp4".into());
        fx.store.update(&mut video).await.unwrap();

        let err = fx
            .service
            .upload_as(
                video.id,
                owner,
                AssetSlot::Video,
                Some("video/mp4"),
                stream::iter(vec![Ok(Bytes::from_static(b"ftypmp42"))]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::UploadFailed(_)));
        assert_eq!(fx.store.get(video.id).await.unwrap().video_url, video.video_url);
        assert_eq!(entries(&fx.spill), 0);
    }

    #[tokio::test]
    async fn inline_thumbnail_round_trips_through_the_record() {
        let fx = fixture(true, RecordingStore::default()).await;
        let owner = Uuid::new_v4();
        let video = fx.store.create(owner, "intro", None).await.unwrap();
        let data = png(1500);

        let updated = fx
            .service
            .upload_as(
                video.id,
                owner,
                AssetSlot::Thumbnail,
                Some("image/png; charset=binary"),
                stream::iter(vec![Ok(Bytes::from(data.clone()))]),
            )
            .await
            .unwrap();

        let url = updated.thumbnail_url.unwrap();
        let payload = url.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), data);
        assert_eq!(entries(&fx.assets), 0);
    }

    #[tokio::test]
    async fn re_upload_replaces_the_locator() {
        let fx = fixture(false, RecordingStore::default()).await;
        let owner = Uuid::new_v4();
        let video = fx.store.create(owner, "intro", None).await.unwrap();

        let mut urls = Vec::new();
        for _ in 0..2 {
            let updated = fx
                .service
                .upload_as(
                    video.id,
                    owner,
                    AssetSlot::Thumbnail,
                    Some("image/jpg"),
                    stream::iter(vec![Ok(Bytes::from_static(b"\xff\xd8\xff"))]),
                )
                .await
                .unwrap();
            urls.push(updated.thumbnail_url.unwrap());
        }

        assert_ne!(urls[0], urls[1]);
        assert!(urls.iter().all(|u| u.ends_with(".jpg")));
        assert_eq!(
            fx.store.get(video.id).await.unwrap().thumbnail_url.as_ref(),
            Some(&urls[1])
        );
        // the earlier file is orphaned, not deleted
        assert_eq!(entries(&fx.assets), 2);
    }
}
