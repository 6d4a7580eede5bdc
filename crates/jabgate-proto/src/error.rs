//! Error types for the stream protocol library.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Protocol-level errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error while reading or writing the transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Element bytes were not valid UTF-8.
    #[error("invalid utf-8 in element: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Markup that can never become well-formed.
    #[error("malformed markup: {0}")]
    Malformed(String),

    /// The document ended before the outermost element was closed.
    #[error("element is truncated")]
    Truncated,

    /// A partial element grew past the buffering limit.
    #[error("partial element of {actual} bytes exceeds limit of {limit}")]
    ElementTooLong {
        /// Bytes buffered so far.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The account identifier has no domain part.
    #[error("account identifier '{0}' has no domain")]
    MissingDomain(String),
}

impl From<quick_xml::Error> for ProtocolError {
    fn from(err: quick_xml::Error) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}

impl From<quick_xml::escape::EscapeError> for ProtocolError {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ProtocolError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}
