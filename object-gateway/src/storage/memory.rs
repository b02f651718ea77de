// In-process object store for local development and tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::debug;

use super::{ObjectStore, ObjectStream, StagedUpload, StorageError, StorageResult};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// Object store that keeps a single bucket in memory.
///
/// Object operations fail with `NotFound` until the bucket is created,
/// the same way an S3 backend answers `NoSuchBucket`.
#[derive(Debug)]
pub struct MemoryStore {
    bucket: String,
    created: AtomicBool,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            created: AtomicBool::new(false),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    fn ensure_created(&self) -> StorageResult<()> {
        if self.created.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!("bucket {}", self.bucket)))
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> StorageResult<bool> {
        Ok(self.created.load(Ordering::Acquire))
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        self.created.store(true, Ordering::Release);
        Ok(())
    }

    async fn list_objects(&self) -> StorageResult<Vec<String>> {
        self.ensure_created()?;
        Ok(self.objects.read().await.keys().cloned().collect())
    }

    async fn get_object(&self, key: &str) -> StorageResult<ObjectStream> {
        self.ensure_created()?;

        let object = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let len = object.data.len();
        let chunks: Vec<std::io::Result<Bytes>> = (0..len)
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(object.data.slice(start..(start + CHUNK_SIZE).min(len))))
            .collect();

        Ok(ObjectStream {
            content_type: Some(object.content_type),
            content_length: Some(len as u64),
            body: futures::stream::iter(chunks).boxed(),
        })
    }

    async fn put_object(
        &self,
        key: &str,
        upload: StagedUpload,
        content_type: &str,
    ) -> StorageResult<()> {
        self.ensure_created()?;

        let data = tokio::fs::read(upload.path()).await?;
        debug!("Storing {} bytes under {}", data.len(), key);

        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: Bytes::from(data),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.ensure_created()?;
        self.objects.write().await.remove(key);
        Ok(())
    }
}
