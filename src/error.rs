//! Unified error handling for jabgate.
//!
//! Session failures follow one taxonomy so the registry, the HTTP layer and
//! metrics agree on what happened. Nothing here is fatal to the process:
//! every error ends one session or degrades one delivery path.

use jabgate_proto::{ProtocolError, SessionFailure};
use thiserror::Error;

// ============================================================================
// Session Errors
// ============================================================================

/// Errors that end or refuse a session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Connect, read or write failure on the upstream transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the credentials. Carries the raw failure payload.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// TLS negotiation or certificate verification failed.
    #[error("tls verification failed: {0}")]
    Verification(String),

    /// The server refused a handshake step after authentication.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// The handshake did not finish in time.
    #[error("handshake timed out after {0} seconds")]
    HandshakeTimeout(u64),

    /// The account identifier cannot be used to address a stream.
    #[error("invalid account: {0}")]
    InvalidAccount(String),

    /// A push endpoint that is not `http(s)://host[:port][/path]`.
    #[error("invalid push endpoint: {0}")]
    InvalidEndpoint(String),

    /// No live session holds this token.
    #[error("unknown session token")]
    UnknownToken,

    /// The session is no longer running.
    #[error("session closed")]
    Closed,

    /// Persistence failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::AuthRejected(_) => "auth_rejected",
            Self::Verification(_) => "verification",
            Self::Negotiation(_) => "negotiation",
            Self::HandshakeTimeout(_) => "handshake_timeout",
            Self::InvalidAccount(_) => "invalid_account",
            Self::InvalidEndpoint(_) => "invalid_endpoint",
            Self::UnknownToken => "unknown_token",
            Self::Closed => "closed",
            Self::Store(_) => "store",
        }
    }

    /// Details surfaced to the caller in an `auth_failure` event.
    pub fn details(&self) -> String {
        match self {
            Self::AuthRejected(raw) | Self::Negotiation(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MissingDomain(account) => Self::InvalidAccount(account),
            ProtocolError::Io(e) => Self::Transport(e.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<SessionFailure> for SessionError {
    fn from(failure: SessionFailure) -> Self {
        match failure {
            SessionFailure::AuthRejected(raw) => Self::AuthRejected(raw),
            SessionFailure::TlsRejected(raw) => Self::Verification(raw),
            SessionFailure::Verification(details) => Self::Verification(details),
            SessionFailure::Negotiation(raw) | SessionFailure::StreamError(raw) => {
                Self::Negotiation(raw)
            }
            other @ (SessionFailure::StreamClosed | SessionFailure::Transport(_)) => {
                Self::Transport(other.details())
            }
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

// ============================================================================
// Store Errors
// ============================================================================

/// Session store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// ============================================================================
// Delivery Errors
// ============================================================================

/// A push POST that did not reach or was refused by its endpoint.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("push request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("push timed out")]
    Timeout,
}

impl DeliveryError {
    /// Get a static error code string for metrics labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Timeout => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_rejection_details_are_raw() {
        let raw = "<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><not-authorized/></failure>";
        let err = SessionError::AuthRejected(raw.to_string());
        assert_eq!(err.details(), raw);
        assert_eq!(err.error_code(), "auth_rejected");
    }

    #[test]
    fn test_missing_domain_maps_to_invalid_account() {
        let err = SessionError::from(ProtocolError::MissingDomain("bob".into()));
        assert!(matches!(err, SessionError::InvalidAccount(ref a) if a == "bob"));
    }

    #[test]
    fn test_failure_mapping_keeps_raw_payload() {
        let raw = "<stream:error><conflict/></stream:error>";
        let err = SessionError::from(SessionFailure::StreamError(raw.into()));
        assert_eq!(err.details(), raw);
        let err = SessionError::from(SessionFailure::StreamClosed);
        assert_eq!(err.error_code(), "transport");
    }

    #[test]
    fn test_timeout_details_are_readable() {
        assert_eq!(
            SessionError::HandshakeTimeout(30).details(),
            "handshake timed out after 30 seconds"
        );
    }
}
