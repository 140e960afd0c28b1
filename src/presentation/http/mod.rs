//! HTTP Surface
//!
//! Upgrade endpoint, health probes and metrics.

pub mod handlers;
pub mod routes;
