//! Hermes Core
//!
//! Shared kernel for the hermes gateway client: the JSON wire envelopes
//! exchanged with the gateway and the entity models carried in their
//! payloads. This crate contains no async and no I/O.

pub mod envelope;
pub mod models;

// Re-export commonly used types at crate root
pub use envelope::{CommandEnvelope, ErrorEnvelope, EventEnvelope, Inbound, ResponseEnvelope};
pub use models::{Chat, Contact, Message, MessageSender};
