//! End-to-end sessions over a real WebSocket

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{test_settings, TestApp};

#[tokio::test]
async fn test_session_round_trip_and_reconnection() {
    let app = TestApp::new().await;

    let mut client = app.connect("c1").await;
    let welcome = client.next_json().await;
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["count"], 0);

    client.send_json(json!({"text": "hello"})).await;
    let reply = client.next_json().await;
    assert_eq!(reply["type"], "message_response");
    assert_eq!(reply["count"], 1);

    client.close().await;
    app.wait_detached("c1").await;
    assert_eq!(app.store.peek("c1").unwrap().reason(), Some("connection_closed"));

    let mut client = app.connect("c1").await;
    let notice = client.next_json().await;
    assert_eq!(notice["type"], "reconnection");
    assert_eq!(notice["previousCount"], 1);

    client.send_text("not json at all").await;
    assert_eq!(client.next_json().await["count"], 2);
}

#[tokio::test]
async fn test_disconnect_control_is_acknowledged() {
    let app = TestApp::new().await;
    let mut client = app.connect("c2").await;
    client.next_json().await;
    client.send_json(json!({"n": 1})).await;
    client.next_json().await;

    client.send_json(json!({"type": "disconnect"})).await;

    let ack = client.next_json().await;
    assert_eq!(ack["type"], "disconnect_ack");
    assert_eq!(ack["total"], 1);
    assert_eq!(ack["reason"], "client_requested_disconnect");
    assert!(app.state.lifecycle.registry().contains("c2"));
}

#[tokio::test]
async fn test_duplicate_connection_id_is_refused() {
    let app = TestApp::new().await;
    let mut first = app.connect("dup").await;
    first.next_json().await;

    let mut second = app.connect("dup").await;
    assert_eq!(second.expect_close().await, 1008);

    // The first session is untouched
    first.send_json(json!("still here")).await;
    assert_eq!(first.next_json().await["count"], 1);
    assert_eq!(app.state.lifecycle.registry().len(), 1);
}

#[tokio::test]
async fn test_missing_connection_id_gets_generated() {
    let app = TestApp::new().await;
    let url = format!("ws://{}/ws", app.addr);
    let (_stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while app.state.lifecycle.registry().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let ids: Vec<String> = app
        .state
        .lifecycle
        .registry()
        .snapshot_all()
        .iter()
        .map(|s| s.connection_id().to_string())
        .collect();
    assert!(uuid::Uuid::parse_str(&ids[0]).is_ok());
}

#[tokio::test]
async fn test_heartbeats_arrive_on_schedule() {
    let mut settings = test_settings();
    settings.session.heartbeat_interval_ms = 100;
    let app = TestApp::with_settings(settings).await;

    let mut client = app.connect("hb").await;
    client.next_json().await;

    let beat = client.next_json().await;
    assert_eq!(beat["type"], "heartbeat");
    assert!(beat["timestamp"].is_string());
    assert_eq!(client.next_json().await["type"], "heartbeat");
}

#[tokio::test]
async fn test_shutdown_notifies_and_closes_with_going_away() {
    let app = TestApp::new().await;
    let mut a = app.connect("a").await;
    let mut b = app.connect("b").await;
    a.next_json().await;
    b.next_json().await;
    a.send_json(json!(1)).await;
    a.next_json().await;

    app.coordinator.drain().await;
    assert_eq!(app.state.lifecycle.registry().len(), 0);

    let notice = a.next_json().await;
    assert_eq!(notice["type"], "shutdown");
    assert_eq!(notice["total"], 1);
    assert_eq!(a.expect_close().await, 1001);

    assert_eq!(b.next_json().await["type"], "shutdown");
    assert_eq!(b.expect_close().await, 1001);
}
