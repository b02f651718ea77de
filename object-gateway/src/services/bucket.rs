use tracing::{error, info};

use crate::storage::{ObjectStore, StorageResult};

/// Make sure the configured bucket exists, creating it when absent.
///
/// Runs once before the listener is bound. Any failure is returned so the
/// process can refuse to start.
pub async fn ensure_bucket(store: &dyn ObjectStore) -> StorageResult<()> {
    let bucket = store.bucket().to_string();

    let exists = store.bucket_exists().await.map_err(|e| {
        error!(bucket = %bucket, "Failed to check bucket: {}", e);
        e
    })?;

    if exists {
        info!(bucket = %bucket, "Bucket already exists");
        return Ok(());
    }

    store.create_bucket().await.map_err(|e| {
        error!(bucket = %bucket, "Failed to create bucket: {}", e);
        e
    })?;

    info!(bucket = %bucket, "Bucket created");
    Ok(())
}
