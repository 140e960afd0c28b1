//! Cache Service
//!
//! Thin JSON-over-Redis client used by the session state store.
//!
//! Every round trip is bounded by an operation timeout so that a slow or
//! wedged Redis can never stall a caller for longer than that bound.
//!
//! # Example
//!
//! ```rust,ignore
//! use session_server::infrastructure::cache::RedisCache;
//!
//! let cache = RedisCache::with_prefix(conn, "session_server:", Duration::from_secs(2));
//! cache.set_ex("session:c1", &record, 900).await?;
//! let record: Option<SessionRecord> = cache.get("session:c1").await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument, warn};

use crate::shared::error::StoreError;

/// Redis-backed JSON cache.
///
/// Uses a Redis ConnectionManager, which reconnects on its own after a
/// dropped connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    prefix: Option<Arc<str>>,
    operation_timeout: Duration,
}

impl RedisCache {
    /// Creates a new RedisCache instance.
    pub fn new(conn: ConnectionManager, operation_timeout: Duration) -> Self {
        Self {
            conn,
            prefix: None,
            operation_timeout,
        }
    }

    /// Creates a new RedisCache instance with a key prefix.
    ///
    /// ```rust,ignore
    /// let cache = RedisCache::with_prefix(conn, "session_server:", timeout);
    /// // key "session:c1" becomes "session_server:session:c1"
    /// ```
    pub fn with_prefix(
        conn: ConnectionManager,
        prefix: impl Into<Arc<str>>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            conn,
            prefix: Some(prefix.into()),
            operation_timeout,
        }
    }

    /// Formats a key with the optional prefix.
    fn format_key(&self, key: &str) -> String {
        format_key(self.prefix.as_deref(), key)
    }

    /// Runs one Redis command under the operation timeout.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, op(self.conn.clone())).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                warn!(
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "Redis operation timed out"
                );
                Err(StoreError::Timeout(self.operation_timeout.as_millis() as u64))
            }
        }
    }

    /// Retrieves and deserializes a value.
    #[instrument(skip(self), level = "debug")]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let full_key = self.format_key(key);
        let lookup_key = full_key.clone();
        let result: Option<String> = self
            .run(move |mut conn| async move { conn.get(lookup_key).await })
            .await?;

        match result {
            Some(data) => {
                debug!(key = %full_key, "Cache hit");
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Stores a value with an expiration time.
    #[instrument(skip(self, value), level = "debug")]
    pub async fn set_ex<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        seconds: u64,
    ) -> Result<(), StoreError> {
        let full_key = self.format_key(key);
        let data = serde_json::to_string(value)?;

        self.run(move |mut conn| async move { conn.set_ex::<_, _, ()>(full_key, data, seconds).await })
            .await?;
        debug!(key = %key, ttl = seconds, "Cache set with expiry");

        Ok(())
    }

    /// Deletes a key. Returns whether it existed.
    #[instrument(skip(self), level = "debug")]
    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let full_key = self.format_key(key);
        let deleted: u64 = self
            .run(move |mut conn| async move { conn.del(full_key).await })
            .await?;

        debug!(key = %key, deleted = deleted > 0, "Cache delete");
        Ok(deleted > 0)
    }

    /// Round-trips a PING.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let _: String = self
            .run(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }
}

fn format_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}{}", prefix, key),
        None => key.to_string(),
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}
