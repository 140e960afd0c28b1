//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, Router};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use session_server::application::services::{SessionLifecycle, ShutdownCoordinator};
use session_server::config::{
    RedisSettings, ServerSettings, SessionSettings, Settings, ShutdownSettings, StoreBackend,
    StoreSettings,
};
use session_server::domain::OutboundFrame;
use session_server::infrastructure::cache::InMemorySessionStore;
use session_server::infrastructure::metrics::SessionMetrics;
use session_server::startup::{AppState, Application};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for an isolated instance on an ephemeral port
pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        redis: RedisSettings {
            url: "redis://127.0.0.1:6379".into(),
            key_prefix: "session_server_test:".into(),
            connect_timeout_ms: 100,
            operation_timeout_ms: 500,
            health_check_interval_secs: 5,
        },
        store: StoreSettings {
            backend: StoreBackend::Memory,
        },
        session: SessionSettings::default(),
        shutdown: ShutdownSettings {
            grace_window_secs: 1,
            readiness_delay_ms: 0,
        },
        environment: "test".into(),
    }
}

/// Lifecycle wired to an in-memory store, without any transport
pub fn memory_lifecycle(settings: &SessionSettings) -> (Arc<SessionLifecycle>, Arc<InMemorySessionStore>) {
    let store = Arc::new(InMemorySessionStore::new(settings.reconnection_window()));
    let lifecycle = Arc::new(SessionLifecycle::new(
        store.clone(),
        SessionMetrics::new(),
        settings,
        Duration::from_millis(500),
    ));
    (lifecycle, store)
}

/// Next frame queued for a connection, parsed as JSON
pub fn next_json(rx: &mut UnboundedReceiver<OutboundFrame>) -> Value {
    match rx.try_recv() {
        Ok(OutboundFrame::Text(text)) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {:?}", other),
    }
}

/// Every frame currently queued for a connection
pub fn drain_frames(rx: &mut UnboundedReceiver<OutboundFrame>) -> Vec<OutboundFrame> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

/// Test application builder
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemorySessionStore>,
    pub coordinator: Arc<ShutdownCoordinator>,
    pub addr: SocketAddr,
}

impl TestApp {
    /// Spawn a server backed by an in-memory session store
    pub async fn new() -> Self {
        Self::with_settings(test_settings()).await
    }

    pub async fn with_settings(settings: Settings) -> Self {
        let store = Arc::new(InMemorySessionStore::new(settings.session.reconnection_window()));
        let app = Application::build_with_store(settings, store.clone())
            .await
            .expect("Failed to build application");

        let addr = app.local_addr().expect("Failed to read bound address");
        let router = app.router();
        let state = app.state().clone();
        let coordinator = app.shutdown_coordinator();
        app.spawn();

        Self {
            router,
            state,
            store,
            coordinator,
            addr,
        }
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// GET and parse the body as JSON
    pub async fn get_json(&self, uri: &str) -> (axum::http::StatusCode, Value) {
        let response = self.get(uri).await;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// GET and return the body as text
    pub async fn get_text(&self, uri: &str) -> String {
        let response = self.get(uri).await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    /// Open a WebSocket session with the given connection id
    pub async fn connect(&self, connection_id: &str) -> WsClient {
        WsClient::connect(self.addr, connection_id).await
    }

    /// Wait until the server no longer has `connection_id` attached
    pub async fn wait_detached(&self, connection_id: &str) {
        let registry = Arc::clone(self.state.lifecycle.registry());
        tokio::time::timeout(RECV_TIMEOUT, async {
            while registry.contains(connection_id) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session was never detached");
        self.state.lifecycle.background().settle().await;
    }
}

/// Minimal WebSocket client for end-to-end tests
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(addr: SocketAddr, connection_id: &str) -> Self {
        let url = format!("ws://{}/ws?connectionId={}", addr, connection_id);
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("WebSocket handshake failed");
        Self { stream }
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    pub async fn send_text(&mut self, text: &str) {
        self.stream
            .send(Message::Text(text.to_string().into()))
            .await
            .unwrap();
    }

    /// Next text frame, parsed as JSON
    pub async fn next_json(&mut self) -> Value {
        match self.next_message().await {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    /// Read until the server closes; returns the close code
    pub async fn expect_close(&mut self) -> u16 {
        loop {
            match self.next_message().await {
                Message::Close(Some(frame)) => return u16::from(frame.code),
                Message::Close(None) => panic!("close frame without code"),
                _ => continue,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }

    async fn next_message(&mut self) -> Message {
        loop {
            let message = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream ended")
                .expect("WebSocket error");
            match message {
                Message::Ping(_) | Message::Pong(_) => continue,
                other => return other,
            }
        }
    }
}
