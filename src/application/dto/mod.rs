//! Data Transfer Objects
//!
//! Wire shapes exchanged with clients over the session transport.

pub mod request;
pub mod response;

pub use request::{ClientMessage, ControlMessage};
pub use response::{ServerMessage, CLIENT_REQUESTED_DISCONNECT};
