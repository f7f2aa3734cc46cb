//! Storage abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object storage used by the API (presigning, deletion) and the worker
/// (download of originals, upload of renditions).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Time-limited URL a client can `PUT` the object body to.
    async fn presigned_put_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Time-limited URL to `GET` the object.
    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Reads a small object fully into memory.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Streams the object into `dest`, returning the number of bytes written.
    async fn download_to_file(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64>;

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Uploads a local file. Returns its size in bytes.
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<u64> {
        let data = tokio::fs::read(path).await?;
        let size = data.len() as u64;
        self.upload(bucket, key, Bytes::from(data), content_type)
            .await?;
        Ok(size)
    }
}
