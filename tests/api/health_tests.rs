//! Health Check API Tests

use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use crate::common::{test_settings, TestApp};

async fn wait_ready(app: &TestApp) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !app.state.readiness.is_ready() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("server never became ready");
}

/// Liveness probe always answers while the process runs
#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;

    let (status, body) = app.get_json("/health/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

/// Readiness flips to 200 after the startup delay
#[tokio::test]
async fn test_readiness_probe_reports_ready() {
    let app = TestApp::new().await;
    wait_ready(&app).await;

    let (status, body) = app.get_json("/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["activeSessions"], 0);
    assert_eq!(body["store"]["available"], true);
    assert!(body.get("uptimeSeconds").is_some());
}

/// Readiness stays 503 while the startup delay runs
#[tokio::test]
async fn test_readiness_probe_while_starting() {
    let mut settings = test_settings();
    settings.shutdown.readiness_delay_ms = 60_000;
    let app = TestApp::with_settings(settings).await;

    let (status, body) = app.get_json("/health/ready").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "starting");
}

/// A down store degrades reconnection but not readiness
#[tokio::test]
async fn test_store_outage_keeps_server_ready() {
    let app = TestApp::new().await;
    wait_ready(&app).await;
    app.store.set_available(false);

    let (status, body) = app.get_json("/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"]["available"], false);
}

/// Readiness goes 503 once shutdown starts and upgrades are refused
#[tokio::test]
async fn test_readiness_probe_after_shutdown() {
    let app = TestApp::new().await;
    wait_ready(&app).await;

    app.coordinator.drain().await;

    let (status, body) = app.get_json("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "draining");

    let url = format!("ws://{}/ws?connectionId=late", app.addr);
    match tokio_tungstenite::connect_async(url).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 503);
        }
        Err(e) => panic!("unexpected handshake error: {}", e),
        Ok(_) => panic!("upgrade accepted during shutdown"),
    }
}

/// Metrics endpoint exposes the session gauges
#[tokio::test]
async fn test_metrics_endpoint_tracks_sessions() {
    let app = TestApp::new().await;
    let mut client = app.connect("metrics-1").await;
    client.next_json().await;

    let text = app.get_text("/metrics").await;
    assert!(text.contains("session_server_websocket_connections_active 1"));

    client.close().await;
    app.wait_detached("metrics-1").await;

    let text = app.get_text("/metrics").await;
    assert!(text.contains("session_server_websocket_connections_active 0"));
    assert!(text.contains("session_server_websocket_connection_duration_seconds_count 1"));
}
