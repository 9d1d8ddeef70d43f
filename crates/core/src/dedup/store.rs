use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::issue_key::IssueKey;
use crate::store::KeyValueStore;

use super::types::{DedupPayload, DedupRecord};
use super::DedupError;

const DEDUP_KEYSPACE: &str = "downloaded";

/// Completion records over the shared key-value store.
#[derive(Clone)]
pub struct DedupStore {
    store: Arc<dyn KeyValueStore>,
}

impl DedupStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the record for `key`, or `None` when it is missing or expired.
    ///
    /// A value that does not decode is an error, not a miss: treating it as
    /// absent would re-fetch the issue on every run.
    pub async fn lookup(&self, key: &IssueKey) -> Result<Option<DedupRecord>, DedupError> {
        let store_key = key.namespaced(DEDUP_KEYSPACE);
        let Some(raw) = self.store.get(&store_key).await? else {
            return Ok(None);
        };

        let record = serde_json::from_str(&raw).map_err(|source| DedupError::Corrupt {
            key: store_key,
            source,
        })?;
        debug!("Dedup hit for {}", key);
        Ok(Some(record))
    }

    pub async fn is_recorded(&self, key: &IssueKey) -> Result<bool, DedupError> {
        Ok(self.lookup(key).await?.is_some())
    }

    /// Writes the completion record for `key`, replacing any previous one.
    pub async fn record(
        &self,
        key: &IssueKey,
        payload: DedupPayload,
        retention: Duration,
    ) -> Result<DedupRecord, DedupError> {
        let record = DedupRecord {
            payload,
            completed_at: Utc::now().timestamp(),
        };
        let value = serde_json::to_string(&record).map_err(DedupError::Encode)?;

        self.store
            .set(&key.namespaced(DEDUP_KEYSPACE), &value, retention)
            .await?;

        info!(
            "Recorded {} as downloaded (retention: {} days)",
            key,
            retention.as_secs() / 86_400
        );
        Ok(record)
    }
}
