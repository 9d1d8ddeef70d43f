//! Completion records.
//!
//! A record under `downloaded:{source}:{issue}` means the issue was fully
//! persisted; later runs skip it until the record's retention runs out.
//! Records are written only after persistence succeeded, so a missing record
//! never hides an issue that still needs work.

mod store;
mod types;

pub use store::DedupStore;
pub use types::{DedupPayload, DedupRecord, StoredArtifact};

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Dedup store error: {0}")]
    Store(#[from] StoreError),

    /// A stored record could not be decoded.
    #[error("Corrupt dedup record under {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode dedup record: {0}")]
    Encode(serde_json::Error),
}
