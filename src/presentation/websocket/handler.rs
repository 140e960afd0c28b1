//! WebSocket Connection Handler
//!
//! Adapts one axum WebSocket to the session lifecycle. Inbound frames
//! become lifecycle calls; frames the lifecycle queues on the connection
//! sink are forwarded to the socket in order by a writer task.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::dto::ClientMessage;
use crate::application::services::{LiveSession, SessionLifecycle, SERVER_SHUTDOWN};
use crate::domain::{CloseCode, ConnectionSink, OutboundFrame};
use crate::shared::error::SessionError;
use crate::startup::AppState;

/// Close reason sent when a connection id is already attached.
pub const CONNECTION_ID_IN_USE: &str = "connection_id_in_use";

/// Close code and reason for a refused open.
fn refusal(error: &SessionError) -> (CloseCode, &'static str) {
    match error {
        SessionError::AlreadyAttached(_) => (CloseCode::PolicyViolation, CONNECTION_ID_IN_USE),
        SessionError::ShuttingDown(_) => (CloseCode::GoingAway, SERVER_SHUTDOWN),
    }
}

/// Query parameters accepted on upgrade
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "connectionId")]
    pub connection_id: Option<String>,
}

impl ConnectParams {
    /// The supplied id, or a fresh one if none was given.
    pub fn resolve_connection_id(self) -> String {
        self.connection_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

/// WebSocket upgrade handler. Refuses upgrades once shutdown has begun.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    if state.readiness.is_draining() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response();
    }
    let connection_id = params.resolve_connection_id();
    let lifecycle = Arc::clone(&state.lifecycle);
    ws.on_upgrade(move |socket| handle_socket(socket, connection_id, lifecycle))
}

/// Closes the session when the handler exits, however it exits.
struct SessionGuard {
    lifecycle: Arc<SessionLifecycle>,
    live: Arc<LiveSession>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.lifecycle.close(&self.live);
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, connection_id: String, lifecycle: Arc<SessionLifecycle>) {
    tracing::debug!(connection_id = %connection_id, "New WebSocket connection");

    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();
    let (sink, rx) = ConnectionSink::channel(connection_id.as_str());

    // Forward queued frames to the socket
    let sender_task = tokio::spawn(async move { forward_frames(rx, &mut sender).await });

    let live = match lifecycle.open(&connection_id, sink.clone()).await {
        Ok(live) => live,
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, error = %e, "Open refused");
            let (code, reason) = refusal(&e);
            let _ = sink.close(code, reason);
            drop(sink);
            let _ = sender_task.await;
            return;
        }
    };
    drop(sink);
    let guard = SessionGuard {
        lifecycle: Arc::clone(&lifecycle),
        live,
    };

    // Main message loop
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                lifecycle.handle_message(&guard.live, ClientMessage::from_text(text.as_str()));
            }
            Ok(Message::Binary(bytes)) => {
                lifecycle.handle_message(&guard.live, ClientMessage::from_binary(&bytes));
            }
            Ok(Message::Close(frame)) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    code = frame.as_ref().map(|f| f.code),
                    "Connection closed by client"
                );
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Pong is handled automatically by axum
            }
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Cleanup
    drop(guard);
    sender_task.abort();
}

async fn forward_frames<S>(mut rx: mpsc::UnboundedReceiver<OutboundFrame>, sender: &mut S)
where
    S: futures::Sink<Message> + Unpin,
{
    while let Some(frame) = rx.recv().await {
        match frame {
            OutboundFrame::Text(text) => {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            OutboundFrame::Close { code, reason } => {
                let close = CloseFrame {
                    code: code.code(),
                    reason: reason.into(),
                };
                let _ = sender.send(Message::Close(Some(close))).await;
                break;
            }
        }
    }
}
