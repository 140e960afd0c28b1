//! Transport-facing connection port.
//!
//! The lifecycle never touches a socket directly. It pushes
//! `OutboundFrame`s into a `ConnectionSink`; the transport adapter drains
//! the other end of the channel in delivery order.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::shared::error::SendError;

/// WebSocket close codes used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    /// Clean, client-initiated close
    Normal = 1000,
    /// Server shutdown or internal error
    GoingAway = 1001,
    /// Refused open (connection id already attached)
    PolicyViolation = 1008,
}

impl CloseCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// A frame queued for the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: CloseCode, reason: String },
}

/// Sending half of a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionSink {
    connection_id: Arc<str>,
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl ConnectionSink {
    pub fn new(connection_id: impl Into<Arc<str>>, tx: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self {
            connection_id: connection_id.into(),
            tx,
        }
    }

    /// Create a sink together with the receiver the transport drains.
    pub fn channel(
        connection_id: impl Into<Arc<str>>,
    ) -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(connection_id, tx), rx)
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Serialize `message` and queue it as a text frame.
    pub fn send_json<T: Serialize>(&self, message: &T) -> Result<(), SendError> {
        let text = serde_json::to_string(message).map_err(|e| {
            tracing::error!(connection_id = %self.connection_id, error = %e, "Failed to serialize message");
            self.send_error()
        })?;
        self.send(OutboundFrame::Text(text))
    }

    /// Ask the transport to close the connection.
    pub fn close(&self, code: CloseCode, reason: impl Into<String>) -> Result<(), SendError> {
        self.send(OutboundFrame::Close {
            code,
            reason: reason.into(),
        })
    }

    /// Whether the transport side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, frame: OutboundFrame) -> Result<(), SendError> {
        self.tx.send(frame).map_err(|_| self.send_error())
    }

    fn send_error(&self) -> SendError {
        SendError {
            connection_id: self.connection_id.to_string(),
        }
    }
}
