//! Shared key-value store backing the lock service and the dedup store.
//!
//! The store is a narrow seam: it knows nothing about locks or completion
//! records, only about string keys with an expiry. [`LockService`] and
//! [`DedupStore`] each own a keyspace on top of it, and nothing else in the
//! crate talks to a store directly.
//!
//! Backends:
//! - [`RedisStore`] - shared Redis instance, for multi-host deployments
//! - [`SqliteStore`] - single database file, for single-host deployments
//! - [`MemoryStore`] - process-local map, for tests and dry runs
//!
//! [`LockService`]: crate::lock::LockService
//! [`DedupStore`]: crate::dedup::DedupStore

mod memory;
mod redis_store;
mod sqlite;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

/// Errors raised by a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store connection failed: {0}")]
    Connection(String),

    /// A command was rejected or failed mid-flight.
    #[error("store command failed: {0}")]
    Command(String),

    /// Local database error (SQLite backend).
    #[error("store database error: {0}")]
    Database(String),
}

/// Minimal key-value contract shared by every backend.
///
/// All writes carry a TTL; entries disappear on their own once it elapses.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the backend name (for logging).
    fn name(&self) -> &str;

    /// Atomically writes `value` only if `key` is absent (or expired).
    ///
    /// Returns `true` when this call created the entry.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, StoreError>;

    /// Writes `value`, replacing whatever was there, with a fresh TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Reads a live value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Deletes the entry. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Deletes the entry only if its current value equals `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError>;
}

/// Builds the backend selected in configuration.
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match config.backend {
        StoreBackend::Redis => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| StoreError::Connection("store.url is not set".to_string()))?;
            Ok(Arc::new(RedisStore::connect(url).await?))
        }
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::new(&config.path)?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

/// Converts a TTL into whole milliseconds, never less than one.
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}
