//! In-process storage backend.
//!
//! Keeps objects in a map keyed by `(bucket, key)`. Presigned URLs use a
//! `memory://` scheme and are only meaningful to the process that issued them.

use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

type ObjectMap = BTreeMap<(String, String), StoredObject>;

#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<ObjectMap>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, ObjectMap> {
        // A poisoned map still holds consistent entries; every write is a single insert/remove.
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seeds an object as if a client had uploaded it.
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>, content_type: &str) {
        self.objects().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys stored in `bucket` under `prefix`, in lexical order.
    pub fn keys(&self, bucket: &str, prefix: &str) -> Vec<String> {
        self.objects()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn presigned_put_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(key)?;
        Ok(format!(
            "memory://{}/{}?method=PUT&expires={}",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(key)?;
        Ok(format!(
            "memory://{}/{}?method=GET&expires={}",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        validate_key(key)?;
        self.insert(bucket, key, data, content_type);
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        self.object(bucket, key)
            .map(|object| object.data)
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))
    }

    async fn download_to_file(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64> {
        let object = self
            .object(bucket, key)
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))?;
        tokio::fs::write(dest, &object.data).await?;
        Ok(object.data.len() as u64)
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.objects()
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))
    }
}
