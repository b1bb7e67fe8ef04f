//! Error types for the gateway client

use thiserror::Error;

/// Error type for gateway client operations
///
/// Kept `Clone` so one transport failure can be broadcast to every
/// pending command waiter.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Command attempted with no live connection
    #[error("not connected to gateway")]
    NotConnected,

    /// No response within the caller's bound
    #[error("timed out waiting for response")]
    Timeout,

    /// Transport-level failure during send, or an abrupt close
    #[error("connection error: {0}")]
    Connection(String),

    /// Error envelope from the far side
    #[error("gateway error: {0}")]
    Remote(String),

    /// Outbound frame could not be serialized
    #[error("serialization failed: {0}")]
    Serialization(String),
}
