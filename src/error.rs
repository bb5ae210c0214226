//! Error types for the wspr-beacon library.

use thiserror::Error;

/// The main error type for beacon operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A command argument failed validation.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Unknown amateur radio band name.
    #[error("invalid band: {band}")]
    InvalidBand { band: String },

    /// The supervisor has shut down and no longer accepts commands.
    #[error("channel closed")]
    ChannelClosed,

    /// The spot service could not be reached.
    #[cfg(feature = "spots")]
    #[error("spot service unreachable: {reason}")]
    Offline { reason: String },

    /// HTTP request failed.
    #[cfg(feature = "spots")]
    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),

    /// Response body was not valid JSON.
    #[cfg(feature = "spots")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidArgument`].
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Line framing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    /// A line exceeded the maximum length before a newline arrived.
    #[error("line too long: {size} bytes exceeds maximum {max}")]
    TooLong { size: usize, max: usize },
}

/// Errors produced while decoding a protocol line into a typed message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The line had no tokens.
    #[error("empty line")]
    Empty,

    /// The first token is not a known message kind.
    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    /// The number of tokens does not fit the message kind.
    #[error("{kind}: expected {expected} tokens, got {got}")]
    TokenCount {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    /// A payload token could not be parsed.
    #[error("{kind}: invalid token {token:?}")]
    InvalidToken { kind: &'static str, token: String },
}

/// Result type alias for beacon operations.
pub type Result<T> = std::result::Result<T, Error>;
