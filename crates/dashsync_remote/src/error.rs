//! Error types for remote store operations.

use thiserror::Error;

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors returned by a [`crate::RemoteStore`].
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The call failed or returned a non-success status.
    #[error("transport error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Transport {
        /// HTTP status, absent when no response arrived.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("undecodable response: {0}")]
    Decode(String),

    /// The response decoded but had an unexpected shape.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// The configured remote is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A record filter pattern did not compile.
    #[error("invalid filter pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl RemoteError {
    /// Creates a transport error for a status code.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates a transport error for a call that got no response.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Returns the HTTP status, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns true if the remote reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Returns true if repeating the call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport { status: None, .. } => true,
            RemoteError::Transport {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
