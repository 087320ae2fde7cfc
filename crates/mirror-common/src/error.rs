//! Common error types for Mirror.

use thiserror::Error;

/// Result type alias using Mirror's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Mirror operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket, stdin, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Signaling channel dropped or refused a message
    #[error("transport error: {0}")]
    Transport(String),

    /// Session description or candidate exchange failed
    #[error("negotiation error: {0}")]
    Negotiation(String),

    /// A required local capability (media source) is missing
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a serialization error from any displayable type.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create a transport error from any displayable type.
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Create a negotiation error from any displayable type.
    pub fn negotiation(msg: impl std::fmt::Display) -> Self {
        Self::Negotiation(msg.to_string())
    }

    /// Create a capability error from any displayable type.
    pub fn capability_unavailable(msg: impl std::fmt::Display) -> Self {
        Self::CapabilityUnavailable(msg.to_string())
    }

    /// Create an internal error from any displayable type.
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    /// True for errors raised by the signaling channel itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}
