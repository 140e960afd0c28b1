//! Session Cache Service
//!
//! Redis-backed `SessionStateStore`.
//!
//! The store tracks whether Redis is reachable. While it is not, every
//! operation short-circuits without touching the network; a background
//! probe pings (or reconnects) periodically and restores availability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{keys, RedisCache};
use crate::config::RedisSettings;
use crate::domain::{Metadata, SessionRecord, SessionStateStore};
use crate::shared::error::StoreError;

/// Session state store backed by Redis.
pub struct SessionCacheService {
    client: Option<Client>,
    cache: RwLock<Option<RedisCache>>,
    available: AtomicBool,
    settings: RedisSettings,
    ttl_secs: u64,
    shutdown: CancellationToken,
}

impl SessionCacheService {
    /// Connect to Redis. Never fails: an unreachable or misconfigured
    /// Redis yields a store that starts unavailable.
    pub async fn connect(settings: &RedisSettings, ttl: Duration) -> Arc<Self> {
        let client = match Client::open(settings.url.as_str()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "Invalid Redis URL, session store disabled");
                None
            }
        };

        let store = Arc::new(Self {
            client,
            cache: RwLock::new(None),
            available: AtomicBool::new(false),
            settings: settings.clone(),
            ttl_secs: ttl.as_secs().max(1),
            shutdown: CancellationToken::new(),
        });

        if let Some(cache) = store.try_connect().await {
            *store.cache.write() = Some(cache);
            store.mark_available();
        }
        store
    }

    /// Spawn the availability probe. It stops when the store is closed.
    pub fn spawn_health_probe(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let period = self.settings.health_check_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = store.shutdown.cancelled() => break,
                    _ = interval.tick() => store.probe().await,
                }
            }
            debug!("Session store health probe stopped");
        })
    }

    async fn try_connect(&self) -> Option<RedisCache> {
        let client = self.client.clone()?;
        let connect = redis::aio::ConnectionManager::new(client);
        match tokio::time::timeout(self.settings.connect_timeout(), connect).await {
            Ok(Ok(conn)) => {
                info!("Redis connection established");
                Some(RedisCache::with_prefix(
                    conn,
                    self.settings.key_prefix.as_str(),
                    self.settings.operation_timeout(),
                ))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Redis connection failed");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.connect_timeout_ms,
                    "Redis connection timed out"
                );
                None
            }
        }
    }

    async fn probe(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let cache = self.cache.read().clone();
        match cache {
            Some(cache) => match cache.ping().await {
                Ok(()) => self.mark_available(),
                Err(e) => self.mark_unavailable(&e),
            },
            None => {
                if let Some(cache) = self.try_connect().await {
                    *self.cache.write() = Some(cache);
                    self.mark_available();
                }
            }
        }
    }

    fn mark_available(&self) {
        if !self.shutdown.is_cancelled() && !self.available.swap(true, Ordering::AcqRel) {
            info!("Session store available");
        }
    }

    fn mark_unavailable(&self, error: &StoreError) {
        if self.available.swap(false, Ordering::AcqRel) {
            warn!(error = %error, "Session store unavailable");
        }
    }

    /// The cache to use for one operation, or `Unavailable`.
    fn cache(&self) -> Result<RedisCache, StoreError> {
        if !self.is_available() {
            return Err(StoreError::Unavailable);
        }
        self.cache.read().clone().ok_or(StoreError::Unavailable)
    }

    /// Connection-class failures flip availability; the probe restores it.
    fn observe<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(StoreError::Redis(e)) = &result {
            if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
                self.mark_unavailable(&StoreError::Unavailable);
            }
        }
        result
    }

    async fn write(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let cache = self.cache()?;
        let result = cache
            .set_ex(&keys::session(&record.connection_id), record, self.ttl_secs)
            .await;
        self.observe(result)
    }
}

#[async_trait]
impl SessionStateStore for SessionCacheService {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    async fn get(&self, connection_id: &str) -> Option<SessionRecord> {
        let cache = self.cache().ok()?;
        let result = cache.get::<SessionRecord>(&keys::session(connection_id)).await;
        match self.observe(result) {
            Ok(record) => record,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Session lookup failed");
                None
            }
        }
    }

    async fn put(&self, record: SessionRecord) -> Result<(), StoreError> {
        self.write(&record).await
    }

    async fn update(&self, mut record: SessionRecord) -> Result<(), StoreError> {
        let cache = self.cache()?;
        let existing = self.observe(
            cache
                .get::<SessionRecord>(&keys::session(&record.connection_id))
                .await,
        )?;

        if let Some(existing) = existing {
            record.metadata = merge_metadata(existing.metadata, record.metadata);
        }
        self.write(&record).await
    }

    async fn delete(&self, connection_id: &str) -> Result<bool, StoreError> {
        let cache = self.cache()?;
        let result = cache.delete(&keys::session(connection_id)).await;
        self.observe(result)
    }

    async fn close(&self) {
        self.shutdown.cancel();
        self.available.store(false, Ordering::Release);
        if self.cache.write().take().is_some() {
            info!("Redis connection closed");
        }
    }
}

/// Overlay `update` on `base`; keys in `update` win.
pub(crate) fn merge_metadata(mut base: Metadata, update: Metadata) -> Metadata {
    for (key, value) in update {
        base.insert(key, value);
    }
    base
}
