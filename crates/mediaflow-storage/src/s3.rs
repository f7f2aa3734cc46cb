use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use mediaflow_core::config::StorageConfig;
use mediaflow_core::{BUCKET_IMAGES, BUCKET_ORIGINALS, BUCKET_THUMBS, BUCKET_VOD};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStoreExt, PutOptions, PutPayload, Result as ObjectResult,
};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

/// Buckets the services read and write.
pub const KNOWN_BUCKETS: [&str; 4] = [BUCKET_ORIGINALS, BUCKET_IMAGES, BUCKET_VOD, BUCKET_THUMBS];

#[derive(Clone)]
struct BucketStores {
    /// Talks to the internal endpoint.
    store: AmazonS3,
    /// Signs URLs against the endpoint clients can reach.
    signer: AmazonS3,
}

/// S3-compatible storage (MinIO, AWS S3) spanning the fixed bucket set.
#[derive(Clone)]
pub struct S3Storage {
    buckets: HashMap<String, BucketStores>,
}

impl S3Storage {
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let mut buckets = HashMap::new();
        for bucket in KNOWN_BUCKETS {
            let stores = BucketStores {
                store: Self::build_store(config, bucket, &config.endpoint)?,
                signer: Self::build_store(config, bucket, &config.public_endpoint)?,
            };
            buckets.insert(bucket.to_string(), stores);
        }

        tracing::info!(
            endpoint = %config.endpoint,
            public_endpoint = %config.public_endpoint,
            buckets = KNOWN_BUCKETS.len(),
            "S3 storage initialized"
        );

        Ok(S3Storage { buckets })
    }

    fn build_store(config: &StorageConfig, bucket: &str, endpoint: &str) -> StorageResult<AmazonS3> {
        AmazonS3Builder::new()
            .with_region(config.region.clone())
            .with_bucket_name(bucket)
            .with_access_key_id(config.access_key.clone())
            .with_secret_access_key(config.secret_key.clone())
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"))
            .with_virtual_hosted_style_request(!config.use_path_style)
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))
    }

    fn bucket(&self, bucket: &str) -> StorageResult<&BucketStores> {
        self.buckets
            .get(bucket)
            .ok_or_else(|| StorageError::UnknownBucket(bucket.to_string()))
    }

    async fn sign(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(key)?;
        let location = ObjectPath::from(key);
        let url_result: ObjectResult<_> = self
            .bucket(bucket)?
            .signer
            .signed_url(method, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        Ok(url)
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn presigned_put_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.sign(Method::PUT, bucket, key, expires_in).await
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.sign(Method::GET, bucket, key, expires_in).await
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        validate_key(key)?;
        let size = data.len() as u64;
        let location = ObjectPath::from(key);
        let start = Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let stores = self.bucket(bucket)?;
        let result: ObjectResult<_> = object_store::ObjectStore::put_opts(
            &stores.store,
            &location,
            PutPayload::from(data),
            options,
        )
        .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::debug!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let location = ObjectPath::from(key);
        let result: ObjectResult<_> = self.bucket(bucket)?.store.get(&location).await;

        let data = match result {
            Ok(object) => object.bytes().await,
            Err(e) => Err(e),
        };

        data.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(format!("{}/{}", bucket, key)),
            other => {
                tracing::error!(error = %other, bucket = %bucket, key = %key, "S3 get failed");
                StorageError::DownloadFailed(other.to_string())
            }
        })
    }

    async fn download_to_file(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64> {
        let start = Instant::now();
        let location = ObjectPath::from(key);

        let result: ObjectResult<_> = self.bucket(bucket)?.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(format!("{}/{}", bucket, key)),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = result.into_stream();
        let mut size = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(size)
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let start = Instant::now();
        let location = ObjectPath::from(key);

        let result: ObjectResult<_> = self.bucket(bucket)?.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }
}
