//! Session entity, persisted record and state store trait.
//!
//! A `Session` lives only while its connection is attached. Continuity
//! across reconnects is carried exclusively by `SessionRecord`, which the
//! `SessionStateStore` keeps for a fixed reconnection window.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::StoreError;

/// Opaque key/value bag carried through to persisted records.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata keys written by the lifecycle.
pub mod metadata_keys {
    pub const IS_RECONNECTION: &str = "isReconnection";
    pub const PREVIOUS_COUNT: &str = "previousCount";
    pub const LAST_MESSAGE: &str = "lastMessage";
    pub const LAST_MESSAGE_AT: &str = "lastMessageAt";
    pub const REASON: &str = "reason";
    pub const DISCONNECTED_AT: &str = "disconnectedAt";
}

/// Lifecycle state of an attached session.
///
/// Transitions only move forward: `Attaching -> Active -> Draining -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Attaching,
    Active,
    Draining,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attaching => "attaching",
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }

    /// Whether `next` is the single legal successor of this state.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Attaching, Self::Active)
                | (Self::Active, Self::Draining)
                | (Self::Draining, Self::Closed)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// In-memory state for one attached connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: String,
    pub message_count: u64,
    pub opened_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub metadata: Metadata,
    state: SessionState,
    started: Instant,
}

impl Session {
    /// Allocate a fresh session in `Attaching`.
    pub fn new(connection_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            connection_id: connection_id.into(),
            message_count: 0,
            opened_at: now,
            last_activity_at: now,
            metadata: Metadata::new(),
            state: SessionState::Attaching,
            started: Instant::now(),
        }
    }

    /// Seed this session from a prior record. Only the count and the
    /// reconnection markers carry over; the old session object is never reused.
    pub fn resume_from(&mut self, record: &SessionRecord) {
        self.message_count = record.message_count;
        self.metadata
            .insert(metadata_keys::IS_RECONNECTION.into(), true.into());
        self.metadata
            .insert(metadata_keys::PREVIOUS_COUNT.into(), record.message_count.into());
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_reconnection(&self) -> bool {
        self.metadata
            .get(metadata_keys::IS_RECONNECTION)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Move to `next` if that is the legal successor. Returns whether the
    /// transition happened, so racing close paths can tell who won.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    /// Count one data message and return the new total.
    pub fn record_message(&mut self, payload: serde_json::Value) -> u64 {
        let now = Utc::now();
        self.message_count += 1;
        self.last_activity_at = now;
        self.metadata
            .insert(metadata_keys::LAST_MESSAGE.into(), payload);
        self.metadata
            .insert(metadata_keys::LAST_MESSAGE_AT.into(), now.to_rfc3339().into());
        self.message_count
    }

    /// Time since the session was opened.
    pub fn duration(&self) -> Duration {
        self.started.elapsed()
    }

    /// The record persisted while the session is live.
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord::new(&self.connection_id, self.message_count, self.metadata.clone())
            .with_last_activity(self.last_activity_at)
    }

    /// The record persisted on close, tagged with `reason`.
    pub fn terminal_record(&self, reason: &str) -> SessionRecord {
        SessionRecord::new(&self.connection_id, self.message_count, self.terminal_metadata(reason))
            .with_last_activity(self.last_activity_at)
    }

    /// Fold this session into the terminal record written on close.
    pub fn terminal_metadata(&self, reason: &str) -> Metadata {
        let mut metadata = self.metadata.clone();
        metadata.insert(metadata_keys::REASON.into(), reason.into());
        metadata.insert(
            metadata_keys::DISCONNECTED_AT.into(),
            Utc::now().to_rfc3339().into(),
        );
        metadata
    }
}

/// Cache entry allowing a later session to resume a prior message count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub connection_id: String,
    pub message_count: u64,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SessionRecord {
    pub fn new(connection_id: impl Into<String>, message_count: u64, metadata: Metadata) -> Self {
        Self {
            connection_id: connection_id.into(),
            message_count,
            last_activity: Utc::now(),
            metadata,
        }
    }

    pub fn with_last_activity(mut self, at: DateTime<Utc>) -> Self {
        self.last_activity = at;
        self
    }

    pub fn reason(&self) -> Option<&str> {
        self.metadata
            .get(metadata_keys::REASON)
            .and_then(|v| v.as_str())
    }
}

/// Best-effort façade over the external cache holding `SessionRecord`s.
///
/// Implementations must never block on an unreachable backend: when
/// `is_available()` is false every operation returns immediately with
/// `None` or `StoreError::Unavailable`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStateStore: Send + Sync {
    /// Whether the backing cache is currently reachable.
    fn is_available(&self) -> bool;

    /// Look up a record. Absent and unreachable are both `None`.
    async fn get(&self, connection_id: &str) -> Option<SessionRecord>;

    /// (Re)create a record with a fresh TTL.
    async fn put(&self, record: SessionRecord) -> Result<(), StoreError>;

    /// Refresh an existing record and its TTL, or create it if it expired.
    /// Metadata is merged over the stored record's.
    async fn update(&self, record: SessionRecord) -> Result<(), StoreError>;

    /// Remove a record. Returns whether one existed.
    async fn delete(&self, connection_id: &str) -> Result<bool, StoreError>;

    /// Release the backing connection. Later operations short-circuit.
    async fn close(&self);
}
