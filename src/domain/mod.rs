//! # Domain Layer
//!
//! The domain layer contains the session model and the contracts the rest
//! of the server is written against.
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Store traits define data access contracts
//! - Entities encapsulate their own state transitions

pub mod entities;

// Re-export commonly used types
pub use entities::*;
