//! Scratch space cleanup.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Removes an invocation's temporary files.
///
/// Must be idempotent and succeed when there is nothing to remove.
#[async_trait]
pub trait ScratchCleaner: Send + Sync {
    async fn cleanup_scratch(&self, dir: &Path) -> std::io::Result<()>;
}

/// Deletes the scratch directory recursively, then its parent when that was
/// left empty.
#[derive(Debug, Clone, Default)]
pub struct ScratchDirCleaner;

impl ScratchDirCleaner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScratchCleaner for ScratchDirCleaner {
    async fn cleanup_scratch(&self, dir: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => debug!("Removed scratch directory {}", dir.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        // Another invocation may still be using the parent; remove_dir only
        // succeeds on an empty directory.
        if let Some(parent) = dir.parent() {
            let _ = tokio::fs::remove_dir(parent).await;
        }
        Ok(())
    }
}
