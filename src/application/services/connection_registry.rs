//! Connection Registry
//!
//! Tracks every attached session by connection id. Used to route frames to
//! a live connection and to enumerate sessions during shutdown.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::background::StoreWriter;
use super::heartbeat_service::HeartbeatHandle;
use crate::domain::{ConnectionSink, Session, SessionRecord, SessionState};
use crate::shared::error::SessionError;

/// An attached session together with its transport handle and timers.
pub struct LiveSession {
    connection_id: String,
    sink: ConnectionSink,
    session: Mutex<Session>,
    heartbeat: Mutex<Option<HeartbeatHandle>>,
    writer: StoreWriter,
}

impl LiveSession {
    pub fn new(session: Session, sink: ConnectionSink, writer: StoreWriter) -> Self {
        Self {
            connection_id: session.connection_id.clone(),
            sink,
            session: Mutex::new(session),
            heartbeat: Mutex::new(None),
            writer,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn sink(&self) -> &ConnectionSink {
        &self.sink
    }

    pub fn writer(&self) -> &StoreWriter {
        &self.writer
    }

    pub fn state(&self) -> SessionState {
        self.session.lock().state()
    }

    pub fn message_count(&self) -> u64 {
        self.session.lock().message_count
    }

    /// Copy of the current session state.
    pub fn snapshot(&self) -> Session {
        self.session.lock().clone()
    }

    /// Count a data message if the session is still active.
    /// Returns the record to persist, carrying the new total.
    pub fn record_message(&self, payload: serde_json::Value) -> Option<SessionRecord> {
        let mut session = self.session.lock();
        if session.state() != SessionState::Active {
            return None;
        }
        session.record_message(payload);
        Some(session.to_record())
    }

    /// Move from `Active` to `Draining`. Only the first caller gets the
    /// final snapshot; every later caller gets `None`.
    pub fn begin_drain(&self) -> Option<Session> {
        let mut session = self.session.lock();
        session
            .transition(SessionState::Draining)
            .then(|| session.clone())
    }

    pub(crate) fn mark_closed(&self) {
        self.session.lock().transition(SessionState::Closed);
    }

    /// Attach the heartbeat timer. A session that already left `Active`
    /// gets its timer stopped on the spot.
    pub(crate) fn attach_heartbeat(&self, handle: HeartbeatHandle) {
        let session = self.session.lock();
        if session.state() == SessionState::Active {
            *self.heartbeat.lock() = Some(handle);
        } else {
            handle.cancel();
        }
    }

    /// Stop the heartbeat timer. Returns false if none was running.
    pub(crate) fn cancel_heartbeat(&self) -> bool {
        match self.heartbeat.lock().take() {
            Some(handle) => handle.cancel(),
            None => false,
        }
    }

    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("connection_id", &self.connection_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Map from connection id to the attached session.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: DashMap<String, Arc<LiveSession>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. Fails if the id is already attached.
    pub fn register(&self, session: Arc<LiveSession>) -> Result<(), SessionError> {
        match self.sessions.entry(session.connection_id.clone()) {
            Entry::Occupied(_) => Err(SessionError::AlreadyAttached(
                session.connection_id.clone(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<LiveSession>> {
        self.sessions
            .get(connection_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.sessions.contains_key(connection_id)
    }

    /// Remove whatever is registered under `connection_id`.
    pub fn remove(&self, connection_id: &str) -> Option<Arc<LiveSession>> {
        self.sessions
            .remove(connection_id)
            .map(|(_, session)| session)
    }

    /// Remove `session` only if it is still the one registered under its id.
    pub fn remove_session(&self, session: &Arc<LiveSession>) -> bool {
        self.sessions
            .remove_if(&session.connection_id, |_, current| {
                Arc::ptr_eq(current, session)
            })
            .is_some()
    }

    /// Copy of every attached session. Later registry changes do not
    /// affect the returned list.
    pub fn snapshot_all(&self) -> Vec<Arc<LiveSession>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
