//! Mock scratch cleaner for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::scratch::{ScratchCleaner, ScratchDirCleaner};

/// Mock implementation of the ScratchCleaner trait.
///
/// Records every call, still removes the directory like the real cleaner,
/// and can be told to fail afterwards.
#[derive(Debug, Default)]
pub struct MockCleaner {
    calls: Arc<RwLock<Vec<PathBuf>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn calls(&self) -> Vec<PathBuf> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl ScratchCleaner for MockCleaner {
    async fn cleanup_scratch(&self, dir: &Path) -> std::io::Result<()> {
        self.calls.write().await.push(dir.to_path_buf());
        ScratchDirCleaner::new().cleanup_scratch(dir).await?;

        if *self.fail.read().await {
            return Err(std::io::Error::other("mock cleanup failure"));
        }
        Ok(())
    }
}
