//! Mock object store for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::artifact::{ObjectStore, RemoteError};

/// A recorded upload for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub key: String,
    pub local_path: PathBuf,
    pub size_bytes: u64,
}

/// Mock implementation of the ObjectStore trait.
///
/// Records uploads and can be told to fail puts or bucket creation.
#[derive(Debug)]
pub struct MockObjectStore {
    bucket: String,
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    fail_puts: Arc<RwLock<bool>>,
    fail_bucket: Arc<RwLock<bool>>,
    bucket_checks: Arc<RwLock<usize>>,
}

impl MockObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            uploads: Arc::new(RwLock::new(Vec::new())),
            fail_puts: Arc::new(RwLock::new(false)),
            fail_bucket: Arc::new(RwLock::new(false)),
            bucket_checks: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded uploads.
    pub async fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// Make every subsequent put fail.
    pub async fn set_fail_puts(&self, fail: bool) {
        *self.fail_puts.write().await = fail;
    }

    /// Make `ensure_bucket` fail.
    pub async fn set_fail_bucket(&self, fail: bool) {
        *self.fail_bucket.write().await = fail;
    }

    pub async fn bucket_checks(&self) -> usize {
        *self.bucket_checks.read().await
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn ensure_bucket(&self) -> Result<(), RemoteError> {
        *self.bucket_checks.write().await += 1;
        if *self.fail_bucket.read().await {
            return Err(RemoteError::Other("mock bucket failure".to_string()));
        }
        Ok(())
    }

    async fn put(&self, key: &str, local_path: &Path) -> Result<String, RemoteError> {
        if *self.fail_puts.read().await {
            return Err(RemoteError::Other("mock upload failure".to_string()));
        }

        let size_bytes = tokio::fs::metadata(local_path)
            .await
            .map_err(|source| RemoteError::Read {
                path: local_path.to_path_buf(),
                source,
            })?
            .len();

        self.uploads.write().await.push(RecordedUpload {
            key: key.to_string(),
            local_path: local_path.to_path_buf(),
            size_bytes,
        });
        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}
