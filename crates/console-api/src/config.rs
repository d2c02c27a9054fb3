//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

/// Console API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Per-subscriber event queue depth.
    pub topic_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CONSOLE_ADDR` | Server bind address | `127.0.0.1:8790` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:handover.db?mode=rwc` |
    /// | `TOPIC_CAPACITY` | Per-subscriber event queue depth | `256` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("CONSOLE_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8790".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("SQLITE_PATH")
            .unwrap_or_else(|_| "sqlite:handover.db?mode=rwc".to_string());

        let topic_capacity = match env::var("TOPIC_CAPACITY") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidTopicCapacity)?,
            Err(_) => 256,
        };

        Ok(Self {
            addr,
            database_url,
            topic_capacity,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid CONSOLE_ADDR format")]
    InvalidAddr,

    #[error("TOPIC_CAPACITY must be a positive integer")]
    InvalidTopicCapacity,
}
