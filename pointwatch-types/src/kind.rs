//! Error classification shared across the workspace.

use std::fmt;

/// The category of a failure.
///
/// Every error type in pointwatch maps onto one of these kinds. Callers
/// decide whether to skip an item, abandon a cycle or exit based on the
/// kind rather than on error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// The source could not be reached or did not answer in time.
    SourceUnreachable,
    /// The source answered with something that could not be decoded.
    MalformedResponse,
    /// The requested key or field does not exist.
    KeyNotFound,
    /// A sample was older (or newer) than the freshness tolerance.
    StaleData,
    /// A unit name does not follow the `FFNN` convention.
    InvalidUnitName,
    /// A record could not be serialized or sent.
    PublishFailure,
    /// The sink connection could not be opened.
    SessionStartFailure,
    /// Startup configuration is invalid. The only kind that ends the process.
    FatalConfig,
}

impl ErrorKind {
    /// Whether this kind ends the process.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::FatalConfig)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SourceUnreachable => "source unreachable",
            ErrorKind::MalformedResponse => "malformed response",
            ErrorKind::KeyNotFound => "key not found",
            ErrorKind::StaleData => "stale data",
            ErrorKind::InvalidUnitName => "invalid unit name",
            ErrorKind::PublishFailure => "publish failure",
            ErrorKind::SessionStartFailure => "session start failure",
            ErrorKind::FatalConfig => "fatal configuration error",
        };
        f.write_str(name)
    }
}
