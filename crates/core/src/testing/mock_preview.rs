//! Mock preview builder for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::preview::{PreviewBuilder, PreviewError};

/// Mock implementation of the PreviewBuilder trait.
///
/// Writes a tiny PNG placeholder next to the requested output directory, or
/// fails on demand.
#[derive(Debug, Default)]
pub struct MockPreviewBuilder {
    calls: Arc<RwLock<Vec<PathBuf>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockPreviewBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Primaries a preview was requested for.
    pub async fn calls(&self) -> Vec<PathBuf> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl PreviewBuilder for MockPreviewBuilder {
    async fn build_preview(
        &self,
        primary: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, PreviewError> {
        self.calls.write().await.push(primary.to_path_buf());

        if *self.fail.read().await {
            return Err(PreviewError::render_failed("mock render failure", None));
        }

        let stem = primary
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "preview".to_string());
        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join(format!("{}-cover.png", stem));
        tokio::fs::write(&path, b"\x89PNG mock").await?;
        Ok(path)
    }
}
