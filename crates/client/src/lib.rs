//! Hermes Client
//!
//! Long-lived client for a message-oriented gateway: issues commands
//! and correlates each with exactly one response or error, fans pushed
//! server events out to registered handlers, and survives disconnects
//! via bounded automatic reconnection.
//!
//! # Architecture
//!
//! ```text
//!  callers ──send_command──▶ ┌────────────────────────────┐
//!                            │        GatewayClient       │
//!  handlers ◀──dispatch───── │  ┌──────────┐ ┌─────────┐  │
//!                            │  │Correlator│ │Dispatch │  │
//!                            │  └────┬─────┘ └────┬────┘  │
//!                            │       │ receive loop │     │
//!                            └───────┴──────┬──────┴──────┘
//!                                           │ WebSocket
//!                                           ▼
//!                                        gateway
//! ```

pub mod client;
pub mod config;
mod correlator;
pub mod dispatcher;
pub mod error;

pub use client::GatewayClient;
pub use config::{ClientConfig, ConfigError, load_config, load_config_from_str};
pub use dispatcher::{EventHandler, LifecycleCallback, callback, handler};
pub use error::ClientError;
