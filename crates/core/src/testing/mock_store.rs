//! Mock key-value store for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::store::{KeyValueStore, MemoryStore, StoreError};

/// In-memory store with switches that make the backend misbehave.
///
/// Reads (`get`) and plain writes (`set`) can fail on their own, which lets a
/// test break the dedup store while the lock keyspace keeps working. Marking
/// the store unreachable fails every call.
pub struct MockStore {
    inner: MemoryStore,
    unreachable: Arc<RwLock<bool>>,
    fail_reads: Arc<RwLock<bool>>,
    fail_writes: Arc<RwLock<bool>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            unreachable: Arc::new(RwLock::new(false)),
            fail_reads: Arc::new(RwLock::new(false)),
            fail_writes: Arc::new(RwLock::new(false)),
        }
    }

    /// Fail every call with a connection error.
    pub async fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.write().await = unreachable;
    }

    /// Fail `get`.
    pub async fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.write().await = fail;
    }

    /// Fail `set`. `set_if_absent` and the deletes are unaffected.
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }

    async fn check_reachable(&self) -> Result<(), StoreError> {
        if *self.unreachable.read().await {
            return Err(StoreError::Connection("mock store unreachable".to_string()));
        }
        Ok(())
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check_reachable().await?;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check_reachable().await?;
        if *self.fail_writes.read().await {
            return Err(StoreError::Command("mock write failure".to_string()));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_reachable().await?;
        if *self.fail_reads.read().await {
            return Err(StoreError::Command("mock read failure".to_string()));
        }
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check_reachable().await?;
        self.inner.delete(key).await
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.check_reachable().await?;
        self.inner.delete_if_equals(key, expected).await
    }
}
