//! Redis-backed key-value store.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::{debug, info};

use super::{ttl_millis, KeyValueStore, StoreError};

/// Deletes KEYS[1] only while it still holds ARGV[1].
const COMPARE_AND_DELETE: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

/// Key-value store on a shared Redis instance.
///
/// `SET NX PX` gives the atomic create-if-missing-with-expiry primitive the
/// lock service needs.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisStore {
    /// Connects to Redis and verifies the connection with a `PING`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        info!("Connecting to Redis at {}", url);

        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Connection(format!("invalid Redis URL: {e}")))?;

        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(format!("failed to connect to Redis: {e}")))?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(format!("Redis PING failed: {e}")))?;

        info!("Connected to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        debug!("Redis SET NX: {} (TTL: {:?})", key, ttl);
        let mut conn = self.conn.clone();

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Command(format!("Redis SET NX failed: {e}")))?;

        Ok(reply.is_some())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        debug!("Redis SET: {} (TTL: {:?})", key, ttl);
        let mut conn = self.conn.clone();

        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError::Command(format!("Redis SET failed: {e}")))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        debug!("Redis GET: {}", key);
        let mut conn = self.conn.clone();

        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| StoreError::Command(format!("Redis GET failed: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        debug!("Redis DEL: {}", key);
        let mut conn = self.conn.clone();

        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Command(format!("Redis DEL failed: {e}")))?;

        Ok(removed > 0)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        debug!("Redis compare-and-delete: {}", key);
        let mut conn = self.conn.clone();

        let removed = Script::new(COMPARE_AND_DELETE)
            .key(key)
            .arg(expected)
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(|e| StoreError::Command(format!("Redis compare-and-delete failed: {e}")))?;

        Ok(removed > 0)
    }
}
