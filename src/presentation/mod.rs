//! Presentation Layer
//!
//! HTTP routes and the WebSocket transport adapter.

pub mod http;
pub mod middleware;
pub mod websocket;
