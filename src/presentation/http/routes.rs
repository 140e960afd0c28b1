//! Route Configuration
//!
//! Configures all HTTP routes.

use axum::{routing::get, Router};

use super::handlers;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session WebSocket endpoint
        .route("/ws", get(ws_handler))
        // Health check endpoints
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .with_state(state)
}
