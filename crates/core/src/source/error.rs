use thiserror::Error;

use crate::artifact::StorageError;
use crate::dedup::DedupError;

/// Errors raised while resolving or downloading an issue.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The page did not contain an issue identifier.
    #[error("Issue id not found: {0}")]
    IssueNotFound(String),

    /// The downloaded body is not the expected document type.
    #[error("Invalid document from {url}: {reason}")]
    InvalidDocument { url: String, reason: String },

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Invalid source configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Dedup error: {0}")]
    Dedup(#[from] DedupError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
