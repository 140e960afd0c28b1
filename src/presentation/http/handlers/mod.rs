//! HTTP Handlers
//!
//! Request handlers for the non-WebSocket endpoints.

pub mod health;
pub mod metrics;
