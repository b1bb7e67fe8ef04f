//! Hermes Service
//!
//! Read-through accessors that shield callers from gateway latency:
//! every read checks the cache first, falls back to a gateway command,
//! and populates the cache with what came back.

mod events;
mod service;

pub use events::register_event_logging;
pub use service::{GatewayService, ServiceError};
