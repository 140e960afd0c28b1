//! Heartbeat Scheduler
//!
//! One periodic timer per attached session. Each tick pushes a `heartbeat`
//! frame; a failed push stops the timer for good. Cancellation is
//! idempotent and wins over a pending tick.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::dto::ServerMessage;
use crate::domain::ConnectionSink;
use crate::infrastructure::metrics::SessionMetrics;

/// Handle to one running heartbeat timer.
///
/// Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct HeartbeatHandle {
    token: CancellationToken,
    stopped: Arc<AtomicBool>,
}

impl HeartbeatHandle {
    /// Stop the timer. Exactly one caller gets true, even when callers race
    /// each other or the timer's own stop on a failed send.
    pub fn cancel(&self) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Starts heartbeat timers and counts the ones still running.
#[derive(Clone)]
pub struct HeartbeatScheduler {
    period: Duration,
    active: Arc<AtomicUsize>,
    metrics: SessionMetrics,
}

impl HeartbeatScheduler {
    pub fn new(period: Duration, metrics: SessionMetrics) -> Self {
        Self {
            period,
            active: Arc::new(AtomicUsize::new(0)),
            metrics,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start a timer for `sink`. The first heartbeat goes out one full
    /// period after the call.
    pub fn start(&self, sink: ConnectionSink) -> HeartbeatHandle {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let stopped = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stopped);
        let period = self.period;
        let metrics = self.metrics.clone();
        let guard = ActiveTimer::new(Arc::clone(&self.active));

        tokio::spawn(async move {
            let _guard = guard;
            run_heartbeat(sink, period, cancel, stop, metrics).await;
        });

        HeartbeatHandle { token, stopped }
    }

    /// Timers that have not yet exited.
    pub fn active_timers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

struct ActiveTimer(Arc<AtomicUsize>);

impl ActiveTimer {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self(active)
    }
}

impl Drop for ActiveTimer {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn run_heartbeat(
    sink: ConnectionSink,
    period: Duration,
    cancel: CancellationToken,
    stopped: Arc<AtomicBool>,
    metrics: SessionMetrics,
) {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            _ = ticks.tick() => {
                if let Err(e) = sink.send_json(&ServerMessage::heartbeat()) {
                    metrics.error("send_failure");
                    debug!(
                        connection_id = %sink.connection_id(),
                        error = %e,
                        "Heartbeat send failed, stopping timer"
                    );
                    stopped.store(true, Ordering::Release);
                    cancel.cancel();
                    break;
                }
            }
        }
    }
}
