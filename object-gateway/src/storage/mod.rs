// Storage module for S3/MinIO integration

pub mod memory;
pub mod s3_client;

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tempfile::TempPath;
use thiserror::Error;

pub use memory::MemoryStore;
pub use s3_client::S3Store;

use crate::config::{StorageBackend, StorageConfig};

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Readable object handed back by [`ObjectStore::get_object`].
///
/// Dropping `body` releases the underlying backend connection.
pub struct ObjectStream {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Upload body spooled to a temporary file.
///
/// The file is removed when the value is dropped.
#[derive(Debug)]
pub struct StagedUpload {
    path: TempPath,
    size: u64,
}

impl StagedUpload {
    pub fn new(path: TempPath, size: u64) -> Self {
        Self { path, size }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Object storage operations against the single configured bucket
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket every operation targets
    fn bucket(&self) -> &str;

    async fn bucket_exists(&self) -> StorageResult<bool>;

    async fn create_bucket(&self) -> StorageResult<()>;

    /// Every object name in the bucket, recursively, in backend order
    async fn list_objects(&self) -> StorageResult<Vec<String>>;

    async fn get_object(&self, key: &str) -> StorageResult<ObjectStream>;

    /// Store `upload` under `key`, replacing any existing object
    async fn put_object(
        &self,
        key: &str,
        upload: StagedUpload,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Remove `key`; removing a missing object succeeds
    async fn delete_object(&self, key: &str) -> StorageResult<()>;
}

/// Build the configured backend
pub async fn connect(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::S3 => Ok(Arc::new(S3Store::new(config).await?)),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage backend, objects are lost on restart");
            Ok(Arc::new(MemoryStore::new(config.bucket.clone())))
        }
    }
}
