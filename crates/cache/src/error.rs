//! Error types for the cache crate

use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Durable-tier failure
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (cache directory handling)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
