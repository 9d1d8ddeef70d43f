//! SQLite-backed key-value store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{ttl_millis, KeyValueStore, StoreError};

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Key-value store in a single SQLite file.
///
/// Several processes on the same host may share the file; writes run in
/// `IMMEDIATE` transactions so set-if-absent stays atomic across them.
/// Expired rows are ignored on read and purged lazily on write.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and its table.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_kv_entries_expires_at ON kv_entries(expires_at);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn expiry_millis(ttl: Duration) -> i64 {
        Self::now_millis().saturating_add(ttl_millis(ttl) as i64)
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.execute(
            "DELETE FROM kv_entries WHERE key = ? AND expires_at <= ?",
            params![key, Self::now_millis()],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO kv_entries (key, value, expires_at) VALUES (?, ?, ?)",
                params![key, value, Self::expiry_millis(ttl)],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.commit()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(inserted == 1)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO kv_entries (key, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, Self::expiry_millis(ttl)],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT value FROM kv_entries WHERE key = ? AND expires_at > ?",
            params![key, Self::now_millis()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;
        // Expired rows are removed too but only a live one counts.
        let removed: i64 = conn
            .query_row(
                "DELETE FROM kv_entries WHERE key = ? RETURNING expires_at > ?",
                params![key, Self::now_millis()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?
            .unwrap_or(0);
        Ok(removed > 0)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;
        let removed = conn
            .execute(
                "DELETE FROM kv_entries WHERE key = ? AND value = ? AND expires_at > ?",
                params![key, expected, Self::now_millis()],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(removed > 0)
    }
}
