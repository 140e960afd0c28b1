//! Application Layer
//!
//! Session lifecycle services and the wire DTOs they exchange with
//! clients. Sits between the transport adapter in `presentation` and the
//! domain types.

pub mod dto;
pub mod services;
