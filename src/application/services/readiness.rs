//! Readiness flag exposed to the load balancer.
//!
//! Starts false, flips true after a short startup delay, and goes false
//! for good once shutdown begins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

#[derive(Clone, Default)]
pub struct Readiness {
    ready: Arc<AtomicBool>,
    draining: Arc<AtomicBool>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Report ready. Has no effect once shutdown has begun.
    pub fn mark_ready(&self) -> bool {
        if self.is_draining() {
            return false;
        }
        self.ready.store(true, Ordering::Release);
        // A drain that started between the check and the store wins.
        if self.is_draining() {
            self.ready.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// Report not ready, permanently.
    pub fn mark_draining(&self) {
        self.draining.store(true, Ordering::Release);
        self.ready.store(false, Ordering::Release);
    }

    /// Flip to ready once `delay` has passed.
    pub fn spawn_ready_after(&self, delay: Duration) -> JoinHandle<()> {
        let readiness = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if readiness.mark_ready() {
                info!("Server ready to accept traffic");
            }
        })
    }
}
