use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::issue_key::IssueKey;
use crate::store::KeyValueStore;

use super::guard::LockGuard;
use super::LockError;

const LOCK_KEYSPACE: &str = "lock";

/// Value stored under a lock key.
#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    token: String,
    acquired_at: i64,
}

/// Per-issue lock over the shared key-value store.
#[derive(Clone)]
pub struct LockService {
    store: Arc<dyn KeyValueStore>,
}

impl LockService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Single attempt to take the lock for `key`.
    ///
    /// Returns `None` when another holder owns it. Store failures are errors,
    /// never reported as "not acquired".
    pub async fn acquire(
        &self,
        key: &IssueKey,
        ttl: Duration,
    ) -> Result<Option<LockGuard>, LockError> {
        let record = LockRecord {
            token: Uuid::new_v4().to_string(),
            acquired_at: Utc::now().timestamp(),
        };
        let value = serde_json::to_string(&record)?;

        let acquired = self
            .store
            .set_if_absent(&key.namespaced(LOCK_KEYSPACE), &value, ttl)
            .await?;

        if acquired {
            info!("Lock acquired for {} (TTL: {:?})", key, ttl);
            Ok(Some(LockGuard::new(self.clone(), key.clone(), value)))
        } else {
            warn!("Lock exists, skipping: {}", key);
            Ok(None)
        }
    }

    /// Releases the lock if it still holds `held_value`.
    ///
    /// Returns `false` when the lock already expired or was taken over.
    pub async fn release(&self, key: &IssueKey, held_value: &str) -> Result<bool, LockError> {
        let released = self
            .store
            .delete_if_equals(&key.namespaced(LOCK_KEYSPACE), held_value)
            .await?;

        if released {
            info!("Lock released for {}", key);
        } else {
            warn!(
                "Lock for {} was no longer held at release (expired or taken over)",
                key
            );
        }
        Ok(released)
    }

    /// Whether a live lock exists for `key`.
    pub async fn is_locked(&self, key: &IssueKey) -> Result<bool, LockError> {
        Ok(self
            .store
            .get(&key.namespaced(LOCK_KEYSPACE))
            .await?
            .is_some())
    }

    /// Runs `f` while holding the lock for `key`.
    ///
    /// Returns `Ok(None)` without calling `f` when the lock is held elsewhere.
    /// The lock is released once `f` finishes, whatever it returned; a failed
    /// release is logged and left to TTL expiry. If `f` panics or the future
    /// is dropped, the guard's `Drop` schedules the release instead.
    pub async fn scoped<F, Fut, T>(
        &self,
        key: &IssueKey,
        ttl: Duration,
        f: F,
    ) -> Result<Option<T>, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(guard) = self.acquire(key, ttl).await? else {
            return Ok(None);
        };

        let output = f().await;

        if let Err(e) = guard.release().await {
            warn!(
                "Failed to release lock for {}, it will expire after its TTL: {}",
                key, e
            );
        }

        Ok(Some(output))
    }
}
