//! Client configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for a gateway client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URL of the gateway (e.g. "ws://localhost:8090/ws")
    pub ws_url: String,
    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
    /// Maximum number of automatic reconnection attempts
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Keep-alive ping interval in milliseconds
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,
    /// Bound on waiting for a pong in milliseconds
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,
    /// Bound on the closing handshake in milliseconds
    #[serde(default = "default_close_timeout")]
    pub close_timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        ClientConfig {
            ws_url: ws_url.into(),
            reconnect_interval_ms: default_reconnect_interval(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            ping_interval_ms: default_ping_interval(),
            ping_timeout_ms: default_ping_timeout(),
            close_timeout_ms: default_close_timeout(),
        }
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

// Default value functions for serde
fn default_reconnect_interval() -> u64 {
    5000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_ping_interval() -> u64 {
    30_000
}

fn default_ping_timeout() -> u64 {
    10_000
}

fn default_close_timeout() -> u64 {
    5000
}

/// Load client configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Load client configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<ClientConfig, ConfigError> {
    Ok(serde_json::from_str(json)?)
}
