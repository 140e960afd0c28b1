//! Cache Module
//!
//! Session state store implementations.
//!
//! This module provides:
//! - `RedisCache`: JSON-over-Redis client with bounded round trips
//! - `SessionCacheService`: the Redis-backed `SessionStateStore`
//! - `InMemorySessionStore`: a process-local store with the same semantics
//! - Predefined key prefixes for consistent cache key naming
//!
//! # Architecture
//!
//! ```text
//! +---------------------+
//! |  SessionLifecycle   |
//! +---------------------+
//!          |
//!          v
//! +---------------------+
//! | SessionStateStore   |  <-- Best-effort contract (domain)
//! +---------------------+
//!          |
//!          v
//! +---------------------+
//! | SessionCacheService |  <-- Availability tracking + health probe
//! +---------------------+
//!          |
//!          v
//! +---------------------+
//! |     RedisCache      |  <-- Timeout-bounded commands
//! +---------------------+
//! ```

mod cache_service;
mod memory_cache;
mod session_cache;

pub use cache_service::RedisCache;
pub use memory_cache::InMemorySessionStore;
pub use session_cache::SessionCacheService;

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::config::{RedisSettings, StoreBackend, StoreSettings};
use crate::domain::SessionStateStore;

/// Build the configured session state store.
///
/// A Redis store also gets its availability probe started; the probe
/// stops when the store is closed.
#[instrument(skip_all, fields(backend = ?store.backend))]
pub async fn create_session_store(
    store: &StoreSettings,
    redis: &RedisSettings,
    ttl: Duration,
) -> Arc<dyn SessionStateStore> {
    match store.backend {
        StoreBackend::Redis => {
            let service = SessionCacheService::connect(redis, ttl).await;
            service.spawn_health_probe();
            service as Arc<dyn SessionStateStore>
        }
        StoreBackend::Memory => Arc::new(InMemorySessionStore::new(ttl)) as Arc<dyn SessionStateStore>,
    }
}

/// Cache key prefixes for different data types.
///
/// ```rust,ignore
/// use session_server::infrastructure::cache::keys;
///
/// let key = keys::session("c1"); // "session:c1"
/// ```
pub mod keys {
    /// Prefix for persisted session records (e.g., "session:connection_id")
    pub const SESSION: &str = "session:";

    /// Generates a session record key
    #[inline]
    pub fn session(connection_id: impl std::fmt::Display) -> String {
        format!("{}{}", SESSION, connection_id)
    }
}
