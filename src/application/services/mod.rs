//! Application Services
//!
//! Services that drive attached sessions.
//!
//! ## Available Services
//!
//! - **SessionLifecycle**: open / message / close state machine
//! - **ConnectionRegistry**: attached sessions by connection id
//! - **HeartbeatScheduler**: per-session liveness timers
//! - **ShutdownCoordinator**: bounded drain of all sessions
//! - **Readiness**: load balancer readiness flag
//! - **BackgroundTasks** / **StoreWriter**: best-effort store writes

pub mod background;
pub mod connection_registry;
pub mod heartbeat_service;
pub mod lifecycle_service;
pub mod readiness;
pub mod shutdown_service;

pub use background::{BackgroundTasks, StoreWriter};
pub use connection_registry::{ConnectionRegistry, LiveSession};
pub use heartbeat_service::{HeartbeatHandle, HeartbeatScheduler};
pub use lifecycle_service::{MessageOutcome, SessionLifecycle, CONNECTION_CLOSED, SERVER_SHUTDOWN};
pub use readiness::Readiness;
pub use shutdown_service::{ShutdownCoordinator, ShutdownOutcome, ShutdownReport};
