//! # Domain Entities
//!
//! Core domain entities of the session server.
//!
//! - **Session**: In-memory state for one attached connection
//! - **SessionRecord**: Persisted counters that let a later connection resume
//! - **ConnectionSink**: Outbound port to the transport for one connection
//!
//! ## Store Trait
//!
//! `SessionStateStore` defines the best-effort cache contract. It is
//! implemented in the infrastructure layer, following the dependency
//! inversion principle.

mod connection;
mod session;

pub use connection::{CloseCode, ConnectionSink, OutboundFrame};
pub use session::{metadata_keys, Metadata, Session, SessionRecord, SessionState, SessionStateStore};

#[cfg(test)]
pub use session::MockSessionStateStore;
