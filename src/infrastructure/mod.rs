//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Session state stores (Redis, in-memory)
//! - Metrics sink (Prometheus)

pub mod cache;
pub mod metrics;
