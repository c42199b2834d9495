//! Recoverable routing errors.
//!
//! Index and slot misuse are contract violations and panic at the call site;
//! only setup and connection-parameter problems surface here.

use thiserror::Error;

/// Errors during routing-table setup and connection creation.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    /// Configuration is malformed or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A connector model rejected the connection parameters.
    #[error("Connection rejected: {0}")]
    Connection(String),
}
