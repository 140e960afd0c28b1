//! # Session Server Library
//!
//! Real-time session server. Clients attach over WebSocket with a
//! connection id, exchange counted messages, and may reconnect within a
//! fixed window to resume their count. The server drains every session
//! within a bounded time on shutdown.
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Session state machine, persisted record, store trait, connection sink
//! - **Application Layer**: Lifecycle, registry, heartbeat, shutdown services and wire DTOs
//! - **Infrastructure Layer**: Redis and in-memory session stores, Prometheus metrics
//! - **Presentation Layer**: WebSocket adapter, health probes and metrics endpoint
//!
//! ## Module Structure
//!
//! ```text
//! session_server/
//! +-- config/         Configuration management
//! +-- domain/         Session entities and the store trait
//! +-- application/    Lifecycle services and DTOs
//! +-- infrastructure/ Session store implementations and metrics
//! +-- presentation/   HTTP routes and WebSocket handler
//! +-- shared/         Error types
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
