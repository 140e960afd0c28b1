//! WebSocket Transport
//!
//! Real-time session connections over WebSocket.

pub mod handler;

pub use handler::{ws_handler, ConnectParams, CONNECTION_ID_IN_USE};
