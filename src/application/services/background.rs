//! Best-effort Background Work
//!
//! Store writes never gate a reply to the client. They run as tracked
//! background tasks whose failures show up only in logs and the error
//! counter. Shutdown does not wait for them; `in_flight()` reports how
//! many were still pending when it moved on.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn, Instrument};

use crate::domain::{SessionRecord, SessionStateStore};
use crate::infrastructure::metrics::SessionMetrics;

/// Tracker for fire-and-forget tasks.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker
            .spawn(task.instrument(tracing::debug_span!("background", task = name)));
    }

    /// Tasks spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every task spawned so far has finished.
    ///
    /// Only meaningful once the writers' sessions have closed; a writer
    /// for a still-attached session never finishes.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

enum StoreWrite {
    Update(SessionRecord),
    Terminal(SessionRecord),
}

/// Ordered, non-blocking store writes for one session.
///
/// All writes for a connection go through one queue, so a refresh issued
/// for message N can never land after the terminal record written on close.
pub struct StoreWriter {
    tx: mpsc::UnboundedSender<StoreWrite>,
}

impl StoreWriter {
    pub fn spawn(
        connection_id: String,
        store: Arc<dyn SessionStateStore>,
        metrics: SessionMetrics,
        tasks: &BackgroundTasks,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<StoreWrite>();

        tasks.spawn("store_writer", async move {
            while let Some(write) = rx.recv().await {
                let (result, terminal) = match write {
                    StoreWrite::Update(record) => (store.update(record).await, false),
                    StoreWrite::Terminal(record) => (store.put(record).await, true),
                };

                if let Err(e) = result {
                    metrics.error(e.kind());
                    warn!(
                        connection_id = %connection_id,
                        error = %e,
                        terminal,
                        "Session store write failed"
                    );
                }
                if terminal {
                    break;
                }
            }
            debug!(connection_id = %connection_id, "Store writer finished");
        });

        Self { tx }
    }

    /// Queue a refresh of the persisted record.
    pub fn update(&self, record: SessionRecord) {
        let _ = self.tx.send(StoreWrite::Update(record));
    }

    /// Queue the terminal record. Later writes are discarded.
    pub fn finish(&self, record: SessionRecord) {
        let _ = self.tx.send(StoreWrite::Terminal(record));
    }
}
