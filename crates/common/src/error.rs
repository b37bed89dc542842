//! Error types for the Hive swarm core
//!
//! Faults inside handlers and arsenal modules are opaque (`anyhow`), logged and
//! converted at their boundary. `HiveError` covers the failures a caller can act on.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HiveError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid config file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Payload decode error: {0}")]
    Decode(String),

    #[error("Worker {0} failed: {1}")]
    Worker(String, String),

    #[error("Arsenal module not loaded: {0}")]
    Arsenal(String),

    #[error("Worker not registered: {0}")]
    UnknownWorker(String),
}

/// Result type alias for Hive operations
pub type HiveResult<T> = Result<T, HiveError>;
