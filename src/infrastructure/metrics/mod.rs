//! Prometheus Metrics Module
//!
//! Metrics sink updated by the session lifecycle.
//!
//! # Metrics Collected
//! - Active WebSocket session gauge
//! - Counted message, reconnection and error counters
//! - Message latency and connection duration histograms
//! - Duration of the last coordinated shutdown
//!
//! Each server instance owns its own `Registry`, so independent instances
//! (for example in tests) never share counters.

use std::time::Duration;

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "session_server";

/// Counters, gauges and histograms the lifecycle must keep current.
#[derive(Clone)]
pub struct SessionMetrics {
    registry: Registry,
    /// Sessions currently attached
    pub connections_active: IntGauge,
    /// Counted (non-control) messages
    pub messages_total: IntCounter,
    /// Errors by kind (send_failure, store_unavailable, ...)
    pub errors_total: IntCounterVec,
    /// Opens that resumed a persisted record
    pub reconnections_total: IntCounter,
    /// Receipt-to-reply latency of counted messages
    pub message_latency_seconds: Histogram,
    /// Open-to-close duration of sessions
    pub connection_duration_seconds: Histogram,
    /// Wall-clock duration of the last coordinated shutdown
    pub shutdown_duration_seconds: Gauge,
}

impl SessionMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let connections_active = IntGauge::with_opts(
            Opts::new(
                "websocket_connections_active",
                "Number of attached WebSocket sessions",
            )
            .namespace(NAMESPACE),
        )
        .expect("Failed to create websocket_connections_active metric");

        let messages_total = IntCounter::with_opts(
            Opts::new("websocket_messages_total", "Total counted messages").namespace(NAMESPACE),
        )
        .expect("Failed to create websocket_messages_total metric");

        let errors_total = IntCounterVec::new(
            Opts::new("websocket_errors_total", "Total lifecycle errors by kind")
                .namespace(NAMESPACE),
            &["kind"],
        )
        .expect("Failed to create websocket_errors_total metric");

        let reconnections_total = IntCounter::with_opts(
            Opts::new(
                "websocket_reconnections_total",
                "Total opens that resumed a persisted session",
            )
            .namespace(NAMESPACE),
        )
        .expect("Failed to create websocket_reconnections_total metric");

        let message_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "websocket_message_latency_seconds",
                "Message receipt to reply dispatch latency in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0]),
        )
        .expect("Failed to create websocket_message_latency_seconds metric");

        let connection_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "websocket_connection_duration_seconds",
                "Session duration from open to close in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]),
        )
        .expect("Failed to create websocket_connection_duration_seconds metric");

        let shutdown_duration_seconds = Gauge::with_opts(
            Opts::new(
                "shutdown_duration_seconds",
                "Duration of the last coordinated shutdown in seconds",
            )
            .namespace(NAMESPACE),
        )
        .expect("Failed to create shutdown_duration_seconds metric");

        register_metrics(
            &registry,
            vec![
                Box::new(connections_active.clone()),
                Box::new(messages_total.clone()),
                Box::new(errors_total.clone()),
                Box::new(reconnections_total.clone()),
                Box::new(message_latency_seconds.clone()),
                Box::new(connection_duration_seconds.clone()),
                Box::new(shutdown_duration_seconds.clone()),
            ],
        );

        Self {
            registry,
            connections_active,
            messages_total,
            errors_total,
            reconnections_total,
            message_latency_seconds,
            connection_duration_seconds,
            shutdown_duration_seconds,
        }
    }

    pub fn connection_opened(&self) {
        self.connections_active.inc();
    }

    pub fn connection_closed(&self, duration: Duration) {
        self.connections_active.dec();
        self.connection_duration_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn message_processed(&self, latency: Duration) {
        self.messages_total.inc();
        self.message_latency_seconds.observe(latency.as_secs_f64());
    }

    pub fn reconnection(&self) {
        self.reconnections_total.inc();
    }

    pub fn error(&self, kind: &str) {
        self.errors_total.with_label_values(&[kind]).inc();
    }

    pub fn error_count(&self, kind: &str) -> u64 {
        self.errors_total.with_label_values(&[kind]).get()
    }

    pub fn shutdown_completed(&self, duration: Duration) {
        self.shutdown_duration_seconds.set(duration.as_secs_f64());
    }

    /// Collect and encode all metrics as Prometheus text format
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn register_metrics(registry: &Registry, collectors: Vec<Box<dyn prometheus::core::Collector>>) {
    for collector in collectors {
        registry
            .register(collector)
            .expect("Failed to register session metric");
    }
}
