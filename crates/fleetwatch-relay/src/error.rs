//! Error types for the relay process.
//!
//! Broker failures never show up here: the connection manager retries
//! them forever. What remains is startup (config, fleet) and the query
//! server.

use fleetwatch_core::{ConfigError, StoreError};
use fleetwatch_observer::ServerError;

/// Errors that stop the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The configuration file could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The configured fleet is unusable (e.g. duplicate ids).
    #[error("fleet error: {0}")]
    Fleet(#[from] StoreError),

    /// The query server failed to bind or serve.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// A background task panicked or was aborted.
    #[error("task error: {0}")]
    Task(String),
}
