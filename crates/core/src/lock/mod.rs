//! Distributed mutual exclusion per issue.
//!
//! A lock is a `lock:{source}:{issue}` entry written with an atomic
//! set-if-absent and a TTL. Acquisition is a single non-blocking attempt:
//! a caller that loses treats the issue as owned elsewhere and moves on.
//! A crashed holder is recovered only by TTL expiry; there is no renewal.
//!
//! Each acquisition writes a random token. Release deletes the entry only if
//! it still carries that token, so a holder whose TTL already ran out cannot
//! remove a lock that somebody else has taken since.

mod guard;
mod service;

pub use guard::LockGuard;
pub use service::LockService;

use thiserror::Error;

use crate::store::StoreError;

/// Errors from the lock service.
#[derive(Debug, Error)]
pub enum LockError {
    /// Backing store unreachable or failing.
    #[error("lock store error: {0}")]
    Store(#[from] StoreError),

    /// Lock record could not be encoded.
    #[error("failed to encode lock record: {0}")]
    Encode(#[from] serde_json::Error),
}
