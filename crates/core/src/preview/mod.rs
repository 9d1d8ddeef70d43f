//! Preview (cover image) derivation.
//!
//! A preview is a convenience artifact: the issue processor logs and counts a
//! failed build and carries on without one.

mod command;

pub use command::CommandPreviewBuilder;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Derives a preview image from a primary document.
#[async_trait]
pub trait PreviewBuilder: Send + Sync {
    /// Writes the preview into `output_dir` and returns its path.
    async fn build_preview(&self, primary: &Path, output_dir: &Path)
        -> Result<PathBuf, PreviewError>;
}

/// Errors that can occur while building a preview.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Renderer executable not found.
    #[error("Preview renderer not found: {program}")]
    ProgramNotFound { program: String },

    /// Primary document not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Renderer exited unsuccessfully or produced no image.
    #[error("Preview rendering failed: {reason}")]
    RenderFailed {
        reason: String,
        stderr: Option<String>,
    },

    #[error("Preview rendering timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PreviewError {
    pub fn render_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::RenderFailed {
            reason: reason.into(),
            stderr,
        }
    }
}
