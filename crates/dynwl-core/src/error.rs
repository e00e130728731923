//! Error types for the whitelist provider
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the whitelist provider
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (detected at initialization, never retried)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Network/connection/read failure talking to a remote endpoint
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote endpoint answered with a non-success status
    #[error("Unexpected status {status} from {target}")]
    Status {
        /// URL that was fetched
        target: String,
        /// HTTP status code
        status: u16,
    },

    /// Fetched body is not the expected address literal
    #[error("Malformed address: {0}")]
    MalformedAddress(String),

    /// Lifecycle misuse (e.g. starting a provider twice)
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// The host dropped the receiving side of the output channel
    #[error("Output channel closed by host")]
    OutputClosed,

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a non-success status error
    pub fn status(target: impl Into<String>, status: u16) -> Self {
        Self::Status {
            target: target.into(),
            status,
        }
    }

    /// Create a malformed address error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedAddress(msg.into())
    }

    /// Create a lifecycle error
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }

    /// Whether this error is a per-source fetch failure
    ///
    /// Fetch failures are recovered within a cycle by serving the cached
    /// snapshot for the affected source. Everything else is a programming
    /// or lifecycle error.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status { .. } | Self::MalformedAddress(_)
        )
    }
}
