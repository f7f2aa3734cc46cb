//! Per-asset processing pipeline.
//!
//! Transcode stages run strictly in order:
//! fetching -> metadata extraction -> transcoding -> poster generation ->
//! uploading -> finalizing. Only transcoding and HLS upload failures mark the
//! asset `failed`; a failed fetch leaves it in `processing`. Metadata and
//! poster failures are logged and skipped.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mediaflow_core::models::{AssetKind, AssetRecord, AssetState, NewAssetVariant};
use mediaflow_core::{BUCKET_THUMBS, BUCKET_VOD};
use mediaflow_db::AssetStore;
use mediaflow_storage::keys::{hls_prefix, poster_key};
use mediaflow_storage::Storage;
use uuid::Uuid;

use crate::error::{ProcessingError, ProcessingResult};
use crate::video::ffmpeg::{MediaTools, HLS_LADDER};
use crate::video::hls::{content_type_for, list_files};
use crate::workdir::WorkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeStage {
    Fetching,
    MetadataExtraction,
    Transcoding,
    PosterGeneration,
    Uploading,
    Finalizing,
}

impl Display for TranscodeStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TranscodeStage::Fetching => write!(f, "fetching"),
            TranscodeStage::MetadataExtraction => write!(f, "metadata_extraction"),
            TranscodeStage::Transcoding => write!(f, "transcoding"),
            TranscodeStage::PosterGeneration => write!(f, "poster_generation"),
            TranscodeStage::Uploading => write!(f, "uploading"),
            TranscodeStage::Finalizing => write!(f, "finalizing"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Root under which per-asset work directories are created.
    pub temp_dir: PathBuf,
}

/// An uploaded HLS file: relative path under the asset's HLS prefix and its size.
struct UploadedFile {
    relative: String,
    size: u64,
}

pub struct Processor {
    store: Arc<dyn AssetStore>,
    storage: Arc<dyn Storage>,
    tools: Arc<dyn MediaTools>,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(
        store: Arc<dyn AssetStore>,
        storage: Arc<dyn Storage>,
        tools: Arc<dyn MediaTools>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            storage,
            tools,
            config,
        }
    }

    async fn load_asset(&self, asset_id: Uuid) -> ProcessingResult<AssetRecord> {
        self.store
            .get_asset(asset_id)
            .await?
            .ok_or(ProcessingError::AssetNotFound(asset_id))
    }

    /// Creates the work directory and downloads the original into it.
    async fn fetch(&self, record: &AssetRecord) -> ProcessingResult<(WorkDir, PathBuf)> {
        let asset = &record.asset;
        let workdir = WorkDir::create(&self.config.temp_dir, asset.id).await?;
        let input = workdir.input_path(&asset.filename);

        let size = self
            .storage
            .download_to_file(&asset.bucket, &asset.object_key, &input)
            .await?;
        tracing::debug!(asset_id = %asset.id, size_bytes = size, "Original downloaded");

        Ok((workdir, input))
    }

    async fn mark_failed(&self, asset_id: Uuid, stage: TranscodeStage) {
        if let Err(e) = self.store.set_state(asset_id, AssetState::Failed).await {
            tracing::error!(asset_id = %asset_id, stage = %stage, error = %e, "Failed to mark asset as failed");
        }
    }

    /// Full video pipeline: HLS ladder, poster and metadata, then `ready`.
    #[tracing::instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn transcode_video(&self, asset_id: Uuid) -> ProcessingResult<()> {
        tracing::info!("Starting video transcode");

        tracing::debug!(stage = %TranscodeStage::Fetching, "Entering stage");
        let record = self.load_asset(asset_id).await?;
        let (workdir, input) = self.fetch(&record).await?;

        tracing::debug!(stage = %TranscodeStage::MetadataExtraction, "Entering stage");
        match self.tools.probe(&input).await {
            Ok(info) => {
                if let Err(e) = self.store.upsert_meta(&info.into_meta(asset_id)).await {
                    tracing::warn!(error = %e, "Failed to save metadata");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to extract metadata, continuing anyway"),
        }

        tracing::debug!(stage = %TranscodeStage::Transcoding, "Entering stage");
        let hls_dir = workdir.path().join("hls");
        tokio::fs::create_dir_all(&hls_dir).await?;
        let has_audio = self.tools.has_audio(&input).await;
        tracing::debug!(has_audio, "Detected audio presence");
        if let Err(e) = self.tools.transcode_hls(&input, &hls_dir, has_audio).await {
            tracing::error!(error = %e, "HLS transcode failed");
            self.mark_failed(asset_id, TranscodeStage::Transcoding).await;
            return Err(e);
        }

        tracing::debug!(stage = %TranscodeStage::PosterGeneration, "Entering stage");
        let poster_path = workdir.path().join("poster.jpg");
        let poster_size = match self.tools.extract_poster(&input, &poster_path).await {
            Ok(()) => self.upload_poster(asset_id, &poster_path).await,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to generate poster");
                None
            }
        };

        tracing::debug!(stage = %TranscodeStage::Uploading, "Entering stage");
        let uploaded = match self.upload_hls(asset_id, &hls_dir).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                tracing::error!(error = %e, "Failed to upload HLS files");
                self.mark_failed(asset_id, TranscodeStage::Uploading).await;
                return Err(e);
            }
        };
        self.record_variants(asset_id, &uploaded, poster_size).await;

        tracing::debug!(stage = %TranscodeStage::Finalizing, "Entering stage");
        self.store.set_state(asset_id, AssetState::Ready).await?;

        tracing::info!(files = uploaded.len(), "Video transcode completed successfully");
        Ok(())
    }

    /// Uploads the poster; returns its size when it landed in storage.
    async fn upload_poster(&self, asset_id: Uuid, poster_path: &Path) -> Option<u64> {
        match self
            .storage
            .upload_file(
                BUCKET_THUMBS,
                &poster_key(asset_id),
                poster_path,
                content_type_for(poster_path),
            )
            .await
        {
            Ok(size) => Some(size),
            Err(e) => {
                tracing::warn!(asset_id = %asset_id, error = %e, "Failed to upload poster");
                None
            }
        }
    }

    /// Mirrors the local HLS tree to `media-vod/{asset_id}/hls/`.
    async fn upload_hls(
        &self,
        asset_id: Uuid,
        hls_dir: &Path,
    ) -> ProcessingResult<Vec<UploadedFile>> {
        let prefix = hls_prefix(asset_id);
        let mut uploaded = Vec::new();

        for (path, relative) in list_files(hls_dir).await? {
            let key = format!("{}/{}", prefix, relative);
            tracing::debug!(file = %path.display(), object_key = %key, "Uploading file");
            let size = self
                .storage
                .upload_file(BUCKET_VOD, &key, &path, content_type_for(&path))
                .await?;
            uploaded.push(UploadedFile { relative, size });
        }

        if uploaded.is_empty() {
            return Err(ProcessingError::EmptyOutput(
                hls_dir.display().to_string(),
            ));
        }

        Ok(uploaded)
    }

    /// Records one variant per uploaded rung plus the poster. Best-effort.
    async fn record_variants(
        &self,
        asset_id: Uuid,
        uploaded: &[UploadedFile],
        poster_size: Option<u64>,
    ) {
        let prefix = hls_prefix(asset_id);
        let mut variants = Vec::new();

        for (i, rung) in HLS_LADDER.iter().enumerate() {
            let rung_dir = format!("v{}/", i);
            let playlist = format!("{}playlist.m3u8", rung_dir);
            if !uploaded.iter().any(|f| f.relative == playlist) {
                continue;
            }
            let size: u64 = uploaded
                .iter()
                .filter(|f| f.relative.starts_with(&rung_dir))
                .map(|f| f.size)
                .sum();
            variants.push(NewAssetVariant {
                asset_id,
                variant_type: "hls".to_string(),
                storage_path: format!("{}/{}", prefix, playlist),
                mime_type: "application/vnd.apple.mpegurl".to_string(),
                width: Some(rung.width as i32),
                height: Some(rung.height as i32),
                bitrate: Some(i64::from(rung.bitrate_kbps) * 1000),
                size_bytes: Some(size as i64),
            });
        }

        if let Some(size) = poster_size {
            variants.push(NewAssetVariant {
                asset_id,
                variant_type: "poster".to_string(),
                storage_path: poster_key(asset_id),
                mime_type: "image/jpeg".to_string(),
                width: None,
                height: None,
                bitrate: None,
                size_bytes: Some(size as i64),
            });
        }

        for variant in &variants {
            if let Err(e) = self.store.insert_variant(variant).await {
                tracing::warn!(
                    asset_id = %asset_id,
                    storage_path = %variant.storage_path,
                    error = %e,
                    "Failed to record variant"
                );
            }
        }
    }

    /// Standalone metadata extraction. Only videos are probed.
    #[tracing::instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn extract_metadata(&self, asset_id: Uuid) -> ProcessingResult<()> {
        tracing::info!("Extracting metadata");
        let record = self.load_asset(asset_id).await?;

        if record.asset.kind != AssetKind::Video {
            tracing::debug!(kind = %record.asset.kind, "No metadata extractor for kind");
            return Ok(());
        }

        let (_workdir, input) = self.fetch(&record).await?;
        let info = self.tools.probe(&input).await?;
        self.store.upsert_meta(&info.into_meta(asset_id)).await?;
        Ok(())
    }

    /// Image thumbnails are rendered on the fly by the image proxy; nothing to pre-generate.
    #[tracing::instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn generate_thumbnail(&self, asset_id: Uuid) -> ProcessingResult<()> {
        tracing::debug!("Thumbnail pre-generation not implemented, relying on image proxy");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::probe::ProbeInfo;
    use async_trait::async_trait;
    use chrono::Utc;
    use mediaflow_core::models::{Asset, AssetMeta, NewAsset};
    use mediaflow_core::{AppError, BUCKET_ORIGINALS};
    use bytes::Bytes;
    use mediaflow_storage::{MemoryStorage, StorageError, StorageResult};
    use std::collections::HashMap;
    use std::time::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        assets: Mutex<HashMap<Uuid, Asset>>,
        meta: Mutex<HashMap<Uuid, AssetMeta>>,
        variants: Mutex<Vec<NewAssetVariant>>,
    }

    impl FakeStore {
        fn with_asset(kind: AssetKind, filename: &str) -> (Arc<Self>, Asset) {
            let now = Utc::now();
            let asset = Asset {
                id: Uuid::new_v4(),
                kind,
                state: AssetState::Processing,
                bucket: BUCKET_ORIGINALS.to_string(),
                object_key: format!("2024/01/01/{}", filename),
                filename: filename.to_string(),
                mime_type: "video/mp4".to_string(),
                size_bytes: 4,
                sha256: None,
                created_at: now,
                updated_at: now,
            };
            let store = Arc::new(Self::default());
            store.assets.lock().unwrap().insert(asset.id, asset.clone());
            (store, asset)
        }

        fn state(&self, id: Uuid) -> AssetState {
            self.assets.lock().unwrap()[&id].state
        }
    }

    #[async_trait]
    impl AssetStore for FakeStore {
        async fn create_asset(&self, _asset: &NewAsset) -> Result<Asset, AppError> {
            unimplemented!("not used by the processor")
        }

        async fn get_asset(&self, id: Uuid) -> Result<Option<AssetRecord>, AppError> {
            Ok(self.assets.lock().unwrap().get(&id).map(|asset| AssetRecord {
                asset: asset.clone(),
                width: None,
                height: None,
                duration_seconds: None,
            }))
        }

        async fn list_assets(&self, _limit: i64) -> Result<Vec<AssetRecord>, AppError> {
            Ok(Vec::new())
        }

        async fn begin_processing(&self, _id: Uuid) -> Result<Option<AssetKind>, AppError> {
            Ok(None)
        }

        async fn set_state(&self, id: Uuid, state: AssetState) -> Result<(), AppError> {
            let mut assets = self.assets.lock().unwrap();
            let asset = assets
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(id.to_string()))?;
            asset.state = state;
            Ok(())
        }

        async fn delete_asset(&self, id: Uuid) -> Result<bool, AppError> {
            Ok(self.assets.lock().unwrap().remove(&id).is_some())
        }

        async fn upsert_meta(&self, meta: &AssetMeta) -> Result<(), AppError> {
            self.meta.lock().unwrap().insert(meta.asset_id, meta.clone());
            Ok(())
        }

        async fn insert_variant(&self, variant: &NewAssetVariant) -> Result<(), AppError> {
            self.variants.lock().unwrap().push(variant.clone());
            Ok(())
        }
    }

    /// Writes a plausible HLS tree instead of running ffmpeg.
    #[derive(Default)]
    struct FakeTools {
        fail_probe: bool,
        fail_transcode: bool,
        fail_poster: bool,
        audio: bool,
        saw_audio: AtomicBool,
    }

    #[async_trait]
    impl MediaTools for FakeTools {
        async fn probe(&self, _input: &Path) -> ProcessingResult<ProbeInfo> {
            if self.fail_probe {
                return Err(ProcessingError::Probe("unreadable".to_string()));
            }
            Ok(ProbeInfo {
                width: Some(1920),
                height: Some(1080),
                codec: Some("h264".to_string()),
                ..Default::default()
            })
        }

        async fn has_audio(&self, _input: &Path) -> bool {
            self.audio
        }

        async fn transcode_hls(
            &self,
            _input: &Path,
            output_dir: &Path,
            has_audio: bool,
        ) -> ProcessingResult<()> {
            self.saw_audio.store(has_audio, Ordering::SeqCst);
            if self.fail_transcode {
                return Err(ProcessingError::CommandFailed {
                    program: "ffmpeg".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "boom".to_string(),
                });
            }
            tokio::fs::write(output_dir.join("master.m3u8"), "#EXTM3U\n").await?;
            for i in 0..HLS_LADDER.len() {
                let dir = output_dir.join(format!("v{}", i));
                tokio::fs::create_dir_all(&dir).await?;
                tokio::fs::write(dir.join("playlist.m3u8"), "#EXTM3U\n").await?;
                tokio::fs::write(dir.join("seg-000.ts"), vec![0u8; 188]).await?;
            }
            Ok(())
        }

        async fn extract_poster(&self, _input: &Path, output: &Path) -> ProcessingResult<()> {
            if self.fail_poster {
                return Err(ProcessingError::Probe("no frame".to_string()));
            }
            tokio::fs::write(output, b"jpeg").await?;
            Ok(())
        }
    }

    struct Harness {
        processor: Processor,
        store: Arc<FakeStore>,
        storage: MemoryStorage,
        tools: Arc<FakeTools>,
        asset: Asset,
        temp: tempfile::TempDir,
    }

    fn harness(tools: FakeTools, upload_original: bool) -> Harness {
        let (store, asset) = FakeStore::with_asset(AssetKind::Video, "clip.mp4");
        let storage = MemoryStorage::new();
        if upload_original {
            storage.insert(&asset.bucket, &asset.object_key, &b"mp4!"[..], "video/mp4");
        }
        let tools = Arc::new(tools);
        let temp = tempfile::tempdir().unwrap();
        let processor = Processor::new(
            store.clone(),
            Arc::new(storage.clone()),
            tools.clone(),
            ProcessorConfig {
                temp_dir: temp.path().to_path_buf(),
            },
        );
        Harness {
            processor,
            store,
            storage,
            tools,
            asset,
            temp,
        }
    }

    #[tokio::test]
    async fn successful_transcode_uploads_tree_and_marks_ready() {
        let h = harness(
            FakeTools {
                audio: true,
                ..Default::default()
            },
            true,
        );
        let id = h.asset.id;

        h.processor.transcode_video(id).await.unwrap();

        assert_eq!(h.store.state(id), AssetState::Ready);
        assert!(h.tools.saw_audio.load(Ordering::SeqCst));
        let keys = h.storage.keys(BUCKET_VOD, &format!("{}/hls/", id));
        assert!(keys.contains(&format!("{}/hls/master.m3u8", id)));
        assert!(keys.contains(&format!("{}/hls/v3/seg-000.ts", id)));
        assert_eq!(keys.len(), 9);

        let segment = h
            .storage
            .object(BUCKET_VOD, &format!("{}/hls/v0/seg-000.ts", id))
            .unwrap();
        assert_eq!(segment.content_type, "video/mp2t");
        let poster = h.storage.object(BUCKET_THUMBS, &format!("{}/poster.jpg", id)).unwrap();
        assert_eq!(poster.content_type, "image/jpeg");

        let meta = h.store.meta.lock().unwrap()[&id].clone();
        assert_eq!(meta.width, Some(1920));

        let variants = h.store.variants.lock().unwrap().clone();
        assert_eq!(variants.iter().filter(|v| v.variant_type == "hls").count(), 4);
        assert!(variants.iter().any(|v| v.variant_type == "poster"));
        let top = variants.iter().find(|v| v.height == Some(1080)).unwrap();
        assert_eq!(top.storage_path, format!("{}/hls/v0/playlist.m3u8", id));
        assert_eq!(top.bitrate, Some(5_000_000));
    }

    #[tokio::test]
    async fn silent_source_is_transcoded_without_audio() {
        let h = harness(FakeTools::default(), true);
        h.processor.transcode_video(h.asset.id).await.unwrap();
        assert!(!h.tools.saw_audio.load(Ordering::SeqCst));
        assert_eq!(h.store.state(h.asset.id), AssetState::Ready);
    }

    #[tokio::test]
    async fn workdir_is_removed_after_run() {
        let h = harness(FakeTools::default(), true);
        let id = h.asset.id;
        h.processor.transcode_video(id).await.unwrap();
        assert!(std::fs::read_dir(h.temp.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn transcode_failure_marks_failed() {
        let h = harness(
            FakeTools {
                fail_transcode: true,
                ..Default::default()
            },
            true,
        );
        let id = h.asset.id;

        let err = h.processor.transcode_video(id).await.unwrap_err();

        assert!(matches!(err, ProcessingError::CommandFailed { .. }));
        assert_eq!(h.store.state(id), AssetState::Failed);
        assert!(h.storage.keys(BUCKET_VOD, "").is_empty());
    }

    /// Memory storage that rejects every write to the VOD bucket.
    struct VodRejectingStorage {
        inner: MemoryStorage,
    }

    #[async_trait]
    impl Storage for VodRejectingStorage {
        async fn presigned_put_url(
            &self,
            bucket: &str,
            key: &str,
            expires_in: Duration,
        ) -> StorageResult<String> {
            self.inner.presigned_put_url(bucket, key, expires_in).await
        }

        async fn presigned_get_url(
            &self,
            bucket: &str,
            key: &str,
            expires_in: Duration,
        ) -> StorageResult<String> {
            self.inner.presigned_get_url(bucket, key, expires_in).await
        }

        async fn upload(
            &self,
            bucket: &str,
            key: &str,
            data: Bytes,
            content_type: &str,
        ) -> StorageResult<()> {
            if bucket == BUCKET_VOD {
                return Err(StorageError::UploadFailed(format!("{}/{}", bucket, key)));
            }
            self.inner.upload(bucket, key, data, content_type).await
        }

        async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
            self.inner.get(bucket, key).await
        }

        async fn download_to_file(
            &self,
            bucket: &str,
            key: &str,
            dest: &Path,
        ) -> StorageResult<u64> {
            self.inner.download_to_file(bucket, key, dest).await
        }

        async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
            self.inner.delete(bucket, key).await
        }
    }

    #[tokio::test]
    async fn hls_upload_failure_marks_failed_without_variants() {
        let (store, asset) = FakeStore::with_asset(AssetKind::Video, "clip.mp4");
        let inner = MemoryStorage::new();
        inner.insert(&asset.bucket, &asset.object_key, &b"mp4!"[..], "video/mp4");
        let temp = tempfile::tempdir().unwrap();
        let processor = Processor::new(
            store.clone(),
            Arc::new(VodRejectingStorage {
                inner: inner.clone(),
            }),
            Arc::new(FakeTools::default()),
            ProcessorConfig {
                temp_dir: temp.path().to_path_buf(),
            },
        );

        let err = processor.transcode_video(asset.id).await.unwrap_err();

        assert!(matches!(
            err,
            ProcessingError::Storage(StorageError::UploadFailed(_))
        ));
        assert_eq!(store.state(asset.id), AssetState::Failed);
        assert!(store.variants.lock().unwrap().is_empty());
        assert!(inner.keys(BUCKET_VOD, "").is_empty());
    }

    #[tokio::test]
    async fn missing_original_leaves_asset_processing() {
        let h = harness(FakeTools::default(), false);
        let id = h.asset.id;

        let err = h.processor.transcode_video(id).await.unwrap_err();

        assert!(matches!(err, ProcessingError::Storage(_)));
        assert_eq!(h.store.state(id), AssetState::Processing);
    }

    #[tokio::test]
    async fn metadata_and_poster_failures_do_not_block_ready() {
        let h = harness(
            FakeTools {
                fail_probe: true,
                fail_poster: true,
                ..Default::default()
            },
            true,
        );
        let id = h.asset.id;

        h.processor.transcode_video(id).await.unwrap();

        assert_eq!(h.store.state(id), AssetState::Ready);
        assert!(h.store.meta.lock().unwrap().is_empty());
        assert!(h.storage.object(BUCKET_THUMBS, &format!("{}/poster.jpg", id)).is_none());
        assert!(!h
            .store
            .variants
            .lock()
            .unwrap()
            .iter()
            .any(|v| v.variant_type == "poster"));
    }

    #[tokio::test]
    async fn unknown_asset_is_not_found() {
        let h = harness(FakeTools::default(), true);
        let err = h.processor.transcode_video(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ProcessingError::AssetNotFound(_)));
    }

    #[tokio::test]
    async fn extract_metadata_probes_videos_only() {
        let h = harness(FakeTools::default(), true);
        h.processor.extract_metadata(h.asset.id).await.unwrap();
        assert!(h.store.meta.lock().unwrap().contains_key(&h.asset.id));

        let (store, image) = FakeStore::with_asset(AssetKind::Image, "photo.jpg");
        let processor = Processor::new(
            store.clone(),
            Arc::new(MemoryStorage::new()),
            Arc::new(FakeTools::default()),
            ProcessorConfig {
                temp_dir: h.temp.path().to_path_buf(),
            },
        );
        processor.extract_metadata(image.id).await.unwrap();
        assert!(store.meta.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extract_metadata_propagates_probe_errors() {
        let h = harness(
            FakeTools {
                fail_probe: true,
                ..Default::default()
            },
            true,
        );
        let err = h.processor.extract_metadata(h.asset.id).await.unwrap_err();
        assert!(matches!(err, ProcessingError::Probe(_)));
    }

    #[tokio::test]
    async fn thumbnail_is_a_no_op() {
        let h = harness(FakeTools::default(), true);
        h.processor.generate_thumbnail(h.asset.id).await.unwrap();
        assert_eq!(h.store.state(h.asset.id), AssetState::Processing);
    }
}
