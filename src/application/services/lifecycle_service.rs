//! Session Lifecycle
//!
//! Drives a session from open to close:
//!
//! ```text
//! Attaching --open--> Active --close / graceful_close--> Draining --> Closed
//! ```
//!
//! The store is consulted only on open, under a bounded timeout. Every
//! other store write is queued on the session's writer and never gates a
//! reply. Both close paths race through `LiveSession::begin_drain`, so
//! cleanup runs exactly once per session.
//!
//! Once `stop_accepting` is called, opens are refused. An open whose lookup
//! straddles that call re-checks after registering, so a drain's registry
//! snapshot either contains the session or the open backs out itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use super::background::{BackgroundTasks, StoreWriter};
use super::connection_registry::{ConnectionRegistry, LiveSession};
use super::heartbeat_service::HeartbeatScheduler;
use crate::application::dto::{ClientMessage, ControlMessage, ServerMessage};
use crate::config::SessionSettings;
use crate::domain::{
    CloseCode, ConnectionSink, Session, SessionRecord, SessionState, SessionStateStore,
};
use crate::infrastructure::metrics::SessionMetrics;
use crate::shared::error::SessionError;

/// Reason recorded when the transport reports a disconnect.
pub const CONNECTION_CLOSED: &str = "connection_closed";

/// Reason carried by the shutdown notice and the terminal records.
pub const SERVER_SHUTDOWN: &str = "server_shutdown";

/// What `handle_message` did with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Data message counted; carries the new total
    Counted(u64),
    /// Disconnect control message answered; carries the unchanged total
    DisconnectAcknowledged(u64),
    /// Session no longer active; nothing done
    Ignored,
}

pub struct SessionLifecycle {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn SessionStateStore>,
    heartbeat: HeartbeatScheduler,
    metrics: SessionMetrics,
    background: BackgroundTasks,
    accepting: AtomicBool,
    close_grace: Duration,
    lookup_timeout: Duration,
}

impl SessionLifecycle {
    /// `lookup_timeout` bounds how long an open waits on the store.
    pub fn new(
        store: Arc<dyn SessionStateStore>,
        metrics: SessionMetrics,
        settings: &SessionSettings,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            store,
            heartbeat: HeartbeatScheduler::new(settings.heartbeat_interval(), metrics.clone()),
            metrics,
            background: BackgroundTasks::new(),
            accepting: AtomicBool::new(true),
            close_grace: settings.close_grace(),
            lookup_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn SessionStateStore> {
        &self.store
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn heartbeat(&self) -> &HeartbeatScheduler {
        &self.heartbeat
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Refuse every later open. Must be called before the registry is
    /// snapshotted for a drain.
    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// Attach a new session for `connection_id`.
    ///
    /// Resumes the persisted count when the store has a record for this id,
    /// otherwise starts fresh. Store trouble of any kind degrades to a fresh
    /// session. Fails if the id is already attached or the server has
    /// stopped accepting sessions.
    #[instrument(skip_all, fields(connection_id = %connection_id))]
    pub async fn open(
        &self,
        connection_id: &str,
        sink: ConnectionSink,
    ) -> Result<Arc<LiveSession>, SessionError> {
        if !self.is_accepting() {
            return Err(self.reject_shutdown(connection_id));
        }
        if self.registry.contains(connection_id) {
            return Err(self.reject_duplicate(connection_id));
        }

        let mut session = Session::new(connection_id);
        let greeting = match self.lookup(connection_id).await {
            Some(record) => {
                session.resume_from(&record);
                self.metrics.reconnection();
                ServerMessage::reconnection(record.message_count)
            }
            None => ServerMessage::welcome(),
        };
        session.transition(SessionState::Active);

        let record = session.to_record();
        let count = record.message_count;
        let reconnection = session.is_reconnection();

        let writer = StoreWriter::spawn(
            connection_id.to_string(),
            Arc::clone(&self.store),
            self.metrics.clone(),
            &self.background,
        );
        let live = Arc::new(LiveSession::new(session, sink, writer));
        if self.registry.register(Arc::clone(&live)).is_err() {
            return Err(self.reject_duplicate(connection_id));
        }
        self.metrics.connection_opened();

        // A drain may have snapshotted the registry during the lookup
        if !self.is_accepting() {
            if let Some(snapshot) = live.begin_drain() {
                live.writer().finish(snapshot.terminal_record(SERVER_SHUTDOWN));
                self.finish_close(&live, &snapshot, SERVER_SHUTDOWN);
            }
            return Err(self.reject_shutdown(connection_id));
        }

        live.writer().update(record);
        self.send(&live, &greeting);
        live.attach_heartbeat(self.heartbeat.start(live.sink().clone()));

        info!(reconnection, message_count = count, "Session opened");
        Ok(live)
    }

    /// Handle one inbound message for an attached session.
    pub fn handle_message(&self, live: &LiveSession, message: ClientMessage) -> MessageOutcome {
        let received = Instant::now();

        match message {
            ClientMessage::Control(ControlMessage::Disconnect) => {
                let total = live.message_count();
                self.send(live, &ServerMessage::disconnect_ack(total));
                debug!(connection_id = %live.connection_id(), total, "Disconnect acknowledged");
                MessageOutcome::DisconnectAcknowledged(total)
            }
            ClientMessage::Data(payload) => {
                let Some(record) = live.record_message(payload) else {
                    debug!(
                        connection_id = %live.connection_id(),
                        state = %live.state(),
                        "Message for inactive session ignored"
                    );
                    return MessageOutcome::Ignored;
                };

                let count = record.message_count;
                live.writer().update(record);
                self.send(live, &ServerMessage::message_response(count));
                self.metrics.message_processed(received.elapsed());
                MessageOutcome::Counted(count)
            }
        }
    }

    /// The transport reported a disconnect. Returns false if another close
    /// path already owns this session.
    pub fn close(&self, live: &Arc<LiveSession>) -> bool {
        let Some(snapshot) = live.begin_drain() else {
            debug!(connection_id = %live.connection_id(), "Session already closing");
            return false;
        };

        live.writer().finish(snapshot.terminal_record(CONNECTION_CLOSED));
        self.finish_close(live, &snapshot, CONNECTION_CLOSED);
        true
    }

    /// Server-initiated close: notify the client, give it a moment, then
    /// close the transport with `code`.
    pub async fn graceful_close(
        &self,
        live: &Arc<LiveSession>,
        reason: &str,
        code: CloseCode,
    ) -> bool {
        let Some(snapshot) = live.begin_drain() else {
            return false;
        };

        live.writer().finish(snapshot.terminal_record(reason));
        live.cancel_heartbeat();

        let notice = ServerMessage::shutdown(snapshot.message_count, reason);
        match live.sink().send_json(&notice) {
            Ok(()) => tokio::time::sleep(self.close_grace).await,
            Err(e) => {
                self.metrics.error("send_failure");
                debug!(error = %e, "Shutdown notice not delivered, closing immediately");
            }
        }

        if let Err(e) = live.sink().close(code, reason) {
            debug!(error = %e, "Transport already gone");
        }
        self.finish_close(live, &snapshot, reason);
        true
    }

    /// Gracefully close whatever session is attached under `connection_id`.
    /// Returns false if nothing is attached or another close got there first.
    pub async fn evict(&self, connection_id: &str, reason: &str, code: CloseCode) -> bool {
        match self.registry.get(connection_id) {
            Some(live) => self.graceful_close(&live, reason, code).await,
            None => {
                debug!(connection_id = %connection_id, "Nothing to evict");
                false
            }
        }
    }

    fn finish_close(&self, live: &Arc<LiveSession>, snapshot: &Session, reason: &str) {
        live.cancel_heartbeat();
        if !self.registry.remove_session(live) {
            warn!(connection_id = %live.connection_id(), "Closing session was not registered");
        }
        live.mark_closed();

        let duration = snapshot.duration();
        self.metrics.connection_closed(duration);
        info!(
            connection_id = %live.connection_id(),
            reason,
            message_count = snapshot.message_count,
            duration_ms = duration.as_millis() as u64,
            "Session closed"
        );
    }

    /// Bounded, isolated store lookup. Any failure reads as "no record".
    async fn lookup(&self, connection_id: &str) -> Option<SessionRecord> {
        let store = Arc::clone(&self.store);
        let id = connection_id.to_string();
        let task = tokio::spawn(async move {
            let record = store.get(&id).await?;
            store.is_available().then_some(record)
        });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.lookup_timeout, task).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                self.metrics.error("unexpected_fault");
                error!(error = %e, "Session lookup failed, starting fresh session");
                None
            }
            Err(_) => {
                abort.abort();
                self.metrics.error("store_timeout");
                warn!(
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "Session lookup timed out, starting fresh session"
                );
                None
            }
        }
    }

    fn reject_duplicate(&self, connection_id: &str) -> SessionError {
        self.metrics.error("duplicate_connection");
        warn!(connection_id = %connection_id, "Connection id already attached, refusing open");
        SessionError::AlreadyAttached(connection_id.to_string())
    }

    fn reject_shutdown(&self, connection_id: &str) -> SessionError {
        info!(connection_id = %connection_id, "Shutting down, refusing open");
        SessionError::ShuttingDown(connection_id.to_string())
    }

    fn send(&self, live: &LiveSession, message: &ServerMessage) {
        if let Err(e) = live.sink().send_json(message) {
            self.metrics.error("send_failure");
            debug!(kind = message.kind(), error = %e, "Send failed");
        }
    }
}
