//! Error types for the artifact module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the local tier. These are fatal for the artifact being saved.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Source file not found.
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Remote key is empty, absolute, or escapes the data root.
    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    /// Failed to create destination directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to copy file.
    #[error("Failed to copy file from {source} to {destination}")]
    CopyFailed {
        source: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Failed to move the finished copy into place.
    #[error("Failed to move file from {source} to {destination}")]
    MoveFailed {
        source: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Creates a copy failed error.
    pub fn copy_failed(source: PathBuf, destination: PathBuf, error: std::io::Error) -> Self {
        Self::CopyFailed {
            source,
            destination,
            error,
        }
    }
}

/// Errors from the remote object store. The artifact store degrades on these
/// instead of propagating them.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Remote store configuration is unusable.
    #[error("Invalid remote configuration: {0}")]
    InvalidConfig(String),

    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with an error status.
    #[error("Remote store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Reading the local file for upload failed.
    #[error("Failed to read {path} for upload")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure injected or reported by a non-HTTP backend.
    #[error("Remote store error: {0}")]
    Other(String),
}
