//! In-memory Session Store
//!
//! A process-local `SessionStateStore` with the same TTL and availability
//! semantics as the Redis store. Expiry is measured on the tokio clock, so
//! tests can advance time with a paused runtime.
//!
//! Expired records are dropped lazily on read and swept in bulk on write,
//! at most once per sweep interval.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::session_cache::merge_metadata;
use crate::domain::{SessionRecord, SessionStateStore};
use crate::shared::error::StoreError;

/// Upper bound on the time between sweeps of expired records.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    record: SessionRecord,
    expires_at: Instant,
}

struct Entries {
    map: HashMap<String, Entry>,
    next_sweep: Instant,
}

/// Session state store held in process memory.
pub struct InMemorySessionStore {
    entries: Mutex<Entries>,
    ttl: Duration,
    sweep_interval: Duration,
    available: AtomicBool,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        let sweep_interval = ttl.min(SWEEP_INTERVAL);
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                next_sweep: Instant::now() + sweep_interval,
            }),
            ttl,
            sweep_interval,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backing cache going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Live (unexpired) records, regardless of availability.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a record bypassing the availability check.
    pub fn peek(&self, connection_id: &str) -> Option<SessionRecord> {
        let now = Instant::now();
        self.entries
            .lock()
            .map
            .get(connection_id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.record.clone())
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    fn insert(&self, record: SessionRecord) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if now >= entries.next_sweep {
            let before = entries.map.len();
            entries.map.retain(|_, entry| entry.expires_at > now);
            entries.next_sweep = now + self.sweep_interval;
            let swept = before - entries.map.len();
            if swept > 0 {
                debug!(swept, "Dropped expired session records");
            }
        }

        let entry = Entry {
            expires_at: now + self.ttl,
            record,
        };
        entries.map.insert(entry.record.connection_id.clone(), entry);
    }
}

#[async_trait]
impl SessionStateStore for InMemorySessionStore {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    async fn get(&self, connection_id: &str) -> Option<SessionRecord> {
        if !self.is_available() {
            return None;
        }
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired = match entries.map.get(connection_id) {
            Some(entry) if entry.expires_at > now => return Some(entry.record.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.map.remove(connection_id);
        }
        None
    }

    async fn put(&self, record: SessionRecord) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.insert(record);
        Ok(())
    }

    async fn update(&self, mut record: SessionRecord) -> Result<(), StoreError> {
        self.ensure_available()?;
        if let Some(existing) = self.peek(&record.connection_id) {
            record.metadata = merge_metadata(existing.metadata, record.metadata);
        }
        self.insert(record);
        Ok(())
    }

    async fn delete(&self, connection_id: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        Ok(self.entries.lock().map.remove(connection_id).is_some())
    }

    async fn close(&self) {
        self.set_available(false);
    }
}
