//! Session lifecycle behavior without a transport

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

use session_server::application::dto::ClientMessage;
use session_server::application::services::MessageOutcome;
use session_server::config::SessionSettings;
use session_server::domain::{ConnectionSink, SessionRecord, SessionState, SessionStateStore};

use crate::common::{drain_frames, memory_lifecycle, next_json};

#[tokio::test]
async fn test_open_close_reopen_resumes_count() {
    let (lifecycle, store) = memory_lifecycle(&SessionSettings::default());

    // Open with empty store
    let (sink, mut rx) = ConnectionSink::channel("c1");
    let live = lifecycle.open("c1", sink).await.unwrap();
    let welcome = next_json(&mut rx);
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["count"], 0);

    // One counted message
    lifecycle.handle_message(&live, ClientMessage::from_text(r#"{"text":"hello"}"#));
    let reply = next_json(&mut rx);
    assert_eq!(reply["type"], "message_response");
    assert_eq!(reply["count"], 1);

    // Transport close persists the terminal record
    assert!(lifecycle.close(&live));
    lifecycle.background().settle().await;
    let record = store.peek("c1").unwrap();
    assert_eq!(record.message_count, 1);
    assert_eq!(record.reason(), Some("connection_closed"));

    // Reopen inside the window
    let (sink, mut rx) = ConnectionSink::channel("c1");
    let resumed = lifecycle.open("c1", sink).await.unwrap();
    let notice = next_json(&mut rx);
    assert_eq!(notice["type"], "reconnection");
    assert_eq!(notice["previousCount"], 1);
    assert!(!std::sync::Arc::ptr_eq(&live, &resumed));
}

#[test_case(0 ; "no messages")]
#[test_case(1 ; "one message")]
#[test_case(7 ; "several messages")]
#[test_case(100 ; "many messages")]
#[tokio::test]
async fn test_count_equals_data_messages_and_persists(n: u64) {
    let (lifecycle, store) = memory_lifecycle(&SessionSettings::default());
    let (sink, mut rx) = ConnectionSink::channel("n");
    let live = lifecycle.open("n", sink).await.unwrap();
    next_json(&mut rx);

    for i in 1..=n {
        assert_eq!(
            lifecycle.handle_message(&live, ClientMessage::Data(json!({ "i": i }))),
            MessageOutcome::Counted(i)
        );
        // A disconnect marker between data messages is never counted
        lifecycle.handle_message(&live, ClientMessage::from_text(r#"{"disconnect":true}"#));
    }

    let replies = drain_frames(&mut rx);
    assert_eq!(replies.len() as u64, n * 2);
    assert_eq!(live.message_count(), n);

    lifecycle.close(&live);
    lifecycle.background().settle().await;
    assert_eq!(store.peek("n").unwrap().message_count, n);
}

#[tokio::test]
async fn test_disconnect_control_reports_total_without_closing() {
    let (lifecycle, _) = memory_lifecycle(&SessionSettings::default());
    let (sink, mut rx) = ConnectionSink::channel("c1");
    let live = lifecycle.open("c1", sink).await.unwrap();
    next_json(&mut rx);
    lifecycle.handle_message(&live, ClientMessage::Data(json!(1)));
    lifecycle.handle_message(&live, ClientMessage::Data(json!(2)));
    drain_frames(&mut rx);

    lifecycle.handle_message(&live, ClientMessage::from_text(r#"{"type":"disconnect"}"#));

    let ack = next_json(&mut rx);
    assert_eq!(ack["type"], "disconnect_ack");
    assert_eq!(ack["total"], 2);
    assert_eq!(live.state(), SessionState::Active);
    assert!(lifecycle.registry().contains("c1"));
}

#[tokio::test(start_paused = true)]
async fn test_reopen_after_window_starts_fresh() {
    let settings = SessionSettings::default();
    let (lifecycle, _) = memory_lifecycle(&settings);
    let (sink, _rx) = ConnectionSink::channel("c1");
    let live = lifecycle.open("c1", sink).await.unwrap();
    lifecycle.handle_message(&live, ClientMessage::Data(json!(1)));
    lifecycle.close(&live);
    lifecycle.background().settle().await;

    tokio::time::advance(settings.reconnection_window() + Duration::from_secs(1)).await;

    let (sink, mut rx) = ConnectionSink::channel("c1");
    lifecycle.open("c1", sink).await.unwrap();
    let welcome = next_json(&mut rx);
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["count"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_reopen_just_inside_window_resumes() {
    let settings = SessionSettings::default();
    let (lifecycle, _) = memory_lifecycle(&settings);
    let (sink, _rx) = ConnectionSink::channel("c1");
    let live = lifecycle.open("c1", sink).await.unwrap();
    lifecycle.handle_message(&live, ClientMessage::Data(json!(1)));
    lifecycle.close(&live);
    lifecycle.background().settle().await;

    tokio::time::advance(settings.reconnection_window() - Duration::from_secs(1)).await;

    let (sink, mut rx) = ConnectionSink::channel("c1");
    lifecycle.open("c1", sink).await.unwrap();
    assert_eq!(next_json(&mut rx)["previousCount"], 1);
}

#[tokio::test]
async fn test_unavailable_store_never_breaks_sessions() {
    let (lifecycle, store) = memory_lifecycle(&SessionSettings::default());

    // Seed a record, then lose the store
    store
        .put(SessionRecord::new("c1", 5, Default::default()))
        .await
        .unwrap();
    store.set_available(false);

    let (sink, mut rx) = ConnectionSink::channel("c1");
    let live = lifecycle.open("c1", sink).await.unwrap();
    assert_eq!(next_json(&mut rx)["type"], "welcome");

    for expected in 1..=3 {
        assert_eq!(
            lifecycle.handle_message(&live, ClientMessage::Data(json!(expected))),
            MessageOutcome::Counted(expected)
        );
        assert_eq!(next_json(&mut rx)["count"], expected);
    }

    assert!(lifecycle.close(&live));
    assert!(lifecycle.registry().is_empty());
    assert_eq!(lifecycle.metrics().connections_active.get(), 0);

    lifecycle.background().settle().await;
    // The seeded record was never touched
    assert_eq!(store.peek("c1").unwrap().message_count, 5);
    assert!(lifecycle.metrics().error_count("store_unavailable") >= 4);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_runs_while_attached_and_stops_on_close() {
    let settings = SessionSettings {
        heartbeat_interval_ms: 1_000,
        ..SessionSettings::default()
    };
    let (lifecycle, _) = memory_lifecycle(&settings);
    let (sink, mut rx) = ConnectionSink::channel("c1");
    let live = lifecycle.open("c1", sink).await.unwrap();
    next_json(&mut rx);
    assert_eq!(lifecycle.heartbeat().active_timers(), 1);

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    let beats = drain_frames(&mut rx);
    assert_eq!(beats.len(), 3);
    for beat in beats {
        assert!(matches!(beat, session_server::domain::OutboundFrame::Text(t) if t.contains("heartbeat")));
    }

    lifecycle.close(&live);
    tokio::time::sleep(Duration::from_millis(5_000)).await;

    assert!(drain_frames(&mut rx).is_empty());
    assert_eq!(lifecycle.heartbeat().active_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_stops_when_transport_goes_away() {
    let settings = SessionSettings {
        heartbeat_interval_ms: 1_000,
        ..SessionSettings::default()
    };
    let (lifecycle, _) = memory_lifecycle(&settings);
    let (sink, rx) = ConnectionSink::channel("c1");
    let live = lifecycle.open("c1", sink).await.unwrap();
    drop(rx);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(lifecycle.heartbeat().active_timers(), 0);
    assert!(!live.has_heartbeat());

    // Close still completes cleanup
    assert!(lifecycle.close(&live));
    assert!(lifecycle.registry().is_empty());
}
