//! Health Check Handlers
//!
//! Provides health check endpoints for Kubernetes-style liveness and readiness probes.
//!
//! # Endpoints
//! - `GET /health/live` - Liveness probe (is the process running?)
//! - `GET /health/ready` - Readiness probe (should the load balancer route here?)
//!
//! Readiness is driven only by the startup delay and shutdown. A down
//! session store degrades reconnection but never makes the server unready.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::startup::AppState;

/// Server start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Initialize the server start time (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

/// Overall readiness status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    Ready,
    Starting,
    Draining,
}

impl ReadinessStatus {
    fn from_flags(ready: bool, draining: bool) -> Self {
        match (ready, draining) {
            (_, true) => Self::Draining,
            (true, false) => Self::Ready,
            (false, false) => Self::Starting,
        }
    }

    fn status_code(self) -> StatusCode {
        match self {
            Self::Ready => StatusCode::OK,
            Self::Starting | Self::Draining => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Readiness probe response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: ReadinessStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub active_sessions: usize,
    pub heartbeat_timers: usize,
    pub store: StoreHealth,
}

/// Session store availability
#[derive(Debug, Serialize)]
pub struct StoreHealth {
    pub available: bool,
}

/// Simple liveness response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Liveness probe - checks if the server is running
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe - 200 once warmed up, 503 while starting or draining
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let status = ReadinessStatus::from_flags(
        state.readiness.is_ready(),
        state.readiness.is_draining(),
    );

    let response = ReadinessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        active_sessions: state.lifecycle.registry().len(),
        heartbeat_timers: state.lifecycle.heartbeat().active_timers(),
        store: StoreHealth {
            available: state.lifecycle.store().is_available(),
        },
    };

    (status.status_code(), Json(response))
}
