//! Shutdown Coordinator
//!
//! Drains every attached session in bounded time:
//!
//! 1. Report not ready and stop accepting opens
//! 2. Snapshot the registry
//! 3. Gracefully close all snapshotted sessions in parallel
//! 4. Close the session store
//! 5. Record how long it took
//!
//! The process is then held open until the overall grace window expires so
//! that late sends can still land. Triggering twice is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{info, warn};

use super::lifecycle_service::{SessionLifecycle, SERVER_SHUTDOWN};
use super::readiness::Readiness;
use crate::domain::CloseCode;
use crate::shared::error::ShutdownError;

/// Summary of a completed drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions this drain closed
    pub sessions_drained: usize,
    /// Store writes still pending when the store was closed
    pub writes_in_flight: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Completed(ShutdownReport),
    /// Another trigger already started the drain
    AlreadyInProgress,
    /// The drain did not settle inside the grace window
    TimedOut,
}

pub struct ShutdownCoordinator {
    lifecycle: Arc<SessionLifecycle>,
    readiness: Readiness,
    initiated: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(lifecycle: Arc<SessionLifecycle>, readiness: Readiness) -> Self {
        Self {
            lifecycle,
            readiness,
            initiated: AtomicBool::new(false),
        }
    }

    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::Acquire)
    }

    /// Run the drain sequence once.
    pub async fn drain(&self) -> ShutdownOutcome {
        if self.initiated.swap(true, Ordering::AcqRel) {
            info!("Shutdown already in progress");
            return ShutdownOutcome::AlreadyInProgress;
        }

        let started = Instant::now();
        self.readiness.mark_draining();
        self.lifecycle.stop_accepting();

        let sessions = self.lifecycle.registry().snapshot_all();
        info!(sessions = sessions.len(), "Draining sessions");

        let closes = sessions.iter().map(|live| {
            self.lifecycle
                .graceful_close(live, SERVER_SHUTDOWN, CloseCode::GoingAway)
        });
        let sessions_drained = join_all(closes)
            .await
            .into_iter()
            .filter(|closed| *closed)
            .count();

        let writes_in_flight = self.lifecycle.background().in_flight();
        if writes_in_flight > 0 {
            warn!(
                writes_in_flight,
                "Closing session store with store writes still pending"
            );
        }
        self.lifecycle.store().close().await;

        let elapsed = started.elapsed();
        self.lifecycle.metrics().shutdown_completed(elapsed);
        info!(
            sessions_drained,
            elapsed_ms = elapsed.as_millis() as u64,
            "Drain complete"
        );

        ShutdownOutcome::Completed(ShutdownReport {
            sessions_drained,
            writes_in_flight,
            elapsed,
        })
    }

    /// Drain, then hold until `grace_window` has passed since the call.
    ///
    /// Returns an error only if the drain itself faulted; the caller must
    /// then exit with a failure status.
    pub async fn terminate(
        self: Arc<Self>,
        grace_window: Duration,
    ) -> Result<ShutdownOutcome, ShutdownError> {
        let deadline = tokio::time::Instant::now() + grace_window;
        let coordinator = Arc::clone(&self);
        let drain = tokio::spawn(async move { coordinator.drain().await });

        let outcome = match tokio::time::timeout_at(deadline, drain).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(ShutdownError::Fault(e.to_string())),
            Err(_) => {
                warn!(
                    grace_ms = grace_window.as_millis() as u64,
                    "Drain did not finish within the grace window"
                );
                ShutdownOutcome::TimedOut
            }
        };

        tokio::time::sleep_until(deadline).await;
        Ok(outcome)
    }
}
