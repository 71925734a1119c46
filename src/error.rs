//! Error types for dcwire.

use thiserror::Error;

/// Main error type for all protocol operations.
#[derive(Debug, Error)]
pub enum DcError {
    /// I/O error on the underlying transport.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing-level protocol violation: null byte, missing delimiter,
    /// malformed command name, missing required separator.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A typed read was attempted but a different command arrived.
    /// Carries the raw payload of the received command so the caller can
    /// re-decode or log it.
    #[error("expected {expected:?}, got {received:?}")]
    UnexpectedCommand {
        expected: String,
        received: String,
        data: Vec<u8>,
    },

    /// A specific message field failed to parse.
    #[error("error on field {field}: {cause}")]
    Field { field: &'static str, cause: String },

    /// Payload bytes were not valid UTF-8 after unescaping and no decoder
    /// resolved them.
    #[error("unknown text encoding: {:?}", String::from_utf8_lossy(.0))]
    UnknownEncoding(Vec<u8>),

    /// Zlib stream corrupted, or a compression toggle in an invalid state.
    #[error("compression error: {0}")]
    Compression(String),

    /// A length limit was exceeded (line, name).
    #[error("{0} is too long")]
    Limit(&'static str),

    /// An ADC status with a non-success severity.
    #[error("{0}")]
    Status(crate::adc::Status),
}

impl DcError {
    /// Shorthand for a [`DcError::Protocol`] violation.
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        DcError::Protocol(msg.into())
    }

    /// Shorthand for a [`DcError::Field`] decode error.
    pub(crate) fn field(field: &'static str, cause: impl ToString) -> Self {
        DcError::Field {
            field,
            cause: cause.to_string(),
        }
    }

    /// Shorthand for a [`DcError::Compression`] error.
    pub(crate) fn compression(msg: impl Into<String>) -> Self {
        DcError::Compression(msg.into())
    }
}

/// Result type alias using DcError.
pub type Result<T> = std::result::Result<T, DcError>;
