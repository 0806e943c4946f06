//! Redis backend for the lock manager: `SET key value NX PX ttl` and `DEL`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::error::LockError;
use crate::lock::KeyValueStore;

/// Key-value store backed by one multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    connection: ConnectionManager,
}

impl RedisKeyValueStore {
    /// Opens a connection and verifies it with `PING`.
    pub async fn connect(url: &str) -> Result<Self, LockError> {
        let client = redis::Client::open(url)?;
        let mut connection = ConnectionManager::new(client).await?;

        redis::cmd("PING").query_async::<String>(&mut connection).await?;
        info!("Connected to Redis lock store");

        Ok(RedisKeyValueStore { connection })
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut connection = self.connection.clone();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        // Nil reply means the key already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut connection)
            .await?;

        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<bool, LockError> {
        let mut connection = self.connection.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut connection)
            .await?;

        Ok(removed > 0)
    }
}
