//! Application Error Types
//!
//! Centralized error taxonomy for the session lifecycle. None of these
//! escape the lifecycle's critical path; callers inspect and log them.

/// Failure of a session state store operation.
///
/// Every variant is non-fatal: the live session keeps running and only
/// reconnection continuity is lost.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session store unavailable")]
    Unavailable,

    #[error("Session store operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Short label used for the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Unavailable => "store_unavailable",
            StoreError::Timeout(_) => "store_timeout",
            StoreError::Redis(_) => "store_redis",
            StoreError::Serialization(_) => "store_serialization",
        }
    }
}

/// Lifecycle-level failures surfaced to the transport adapter.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Connection {0} is already attached")]
    AlreadyAttached(String),

    #[error("Server is shutting down, connection {0} refused")]
    ShuttingDown(String),
}

/// The transport could not accept a frame; the connection is presumed gone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Connection {connection_id} is closed")]
pub struct SendError {
    pub connection_id: String,
}

/// The drain sequence itself faulted. The process force-exits.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("Shutdown sequence failed: {0}")]
    Fault(String),
}
