//! Error types for source adapters.

use pointwatch_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur when fetching samples from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be reached, or answered with a transport-level failure.
    #[error("Source unreachable: {0}")]
    Unreachable(String),

    /// The source answered, but the reply could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The source answered successfully but has nothing for the key.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,
}

impl SourceError {
    /// Classify this error.
    ///
    /// A timeout is reported as `SourceUnreachable`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Unreachable(_) | SourceError::Timeout => ErrorKind::SourceUnreachable,
            SourceError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            SourceError::KeyNotFound(_) => ErrorKind::KeyNotFound,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            SourceError::Timeout
        } else {
            SourceError::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::MalformedResponse(err.to_string())
    }
}

#[cfg(any(feature = "directory", feature = "control-bus"))]
impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::MalformedResponse(err.to_string())
        } else {
            SourceError::Unreachable(err.to_string())
        }
    }
}

#[cfg(feature = "key-value")]
impl From<redis::RedisError> for SourceError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_connection_refusal() || err.is_io_error() || err.is_connection_dropped() {
            SourceError::Unreachable(err.to_string())
        } else {
            SourceError::MalformedResponse(err.to_string())
        }
    }
}

#[cfg(feature = "field-bus")]
impl From<tokio_modbus::Error> for SourceError {
    fn from(err: tokio_modbus::Error) -> Self {
        match err {
            tokio_modbus::Error::Transport(io) => io.into(),
            other => SourceError::MalformedResponse(other.to_string()),
        }
    }
}

#[cfg(feature = "field-bus")]
impl From<tokio_modbus::ExceptionCode> for SourceError {
    fn from(code: tokio_modbus::ExceptionCode) -> Self {
        SourceError::MalformedResponse(format!("exception response {code:?}"))
    }
}
