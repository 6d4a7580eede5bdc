//! Sans-IO client session state machine.
//!
//! [`SessionMachine`] carries one logical connection from the first stream
//! header through STARTTLS, token authentication, resource binding, session
//! establishment and the roster fetch, then classifies every stanza of the
//! steady-state stream into [`InboundEvent`]s.
//!
//! It performs no I/O. The driver feeds it decoded [`Frame`]s and transport
//! notifications and carries out the returned [`SessionAction`]s in order.
//!
//! # Example
//!
//! ```
//! use jabgate_proto::{SessionAction, SessionConfig, SessionMachine, StreamCodec};
//!
//! let mut machine = SessionMachine::new(SessionConfig::new("a@example.com", "S")).unwrap();
//! let actions = machine.connected();
//! assert!(matches!(&actions[0], SessionAction::Send(header) if header.contains("to='example.com'")));
//!
//! let mut codec = StreamCodec::new();
//! let input = b"<stream:stream xmlns:stream='http://etherx.jabber.org/streams'>\
//!               <stream:features><starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/></stream:features>";
//! for frame in codec.feed(input) {
//!     for action in machine.feed(&frame) {
//!         // write SessionAction::Send payloads to the transport...
//!         # let _ = action;
//!     }
//! }
//! ```
//!
//! [`Frame`]: crate::Frame
//! [`InboundEvent`]: crate::InboundEvent

mod machine;
mod transitions;

pub use machine::SessionMachine;

use crate::event::InboundEvent;

/// Resource requested at bind time unless configured otherwise.
pub const DEFAULT_RESOURCE: &str = "jabgate";

/// Handshake stage of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SessionStage {
    /// Transport not yet open.
    #[default]
    Connecting,
    /// Plaintext stream open, negotiating STARTTLS.
    PlaintextNegotiating,
    /// The transport is being handed to the TLS collaborator.
    TlsUpgrading,
    /// Encrypted stream open, token authentication in progress.
    Authenticating,
    /// Waiting for the bound full identifier.
    Binding,
    /// Waiting for the session-establishment result.
    EstablishingSession,
    /// Waiting for the roster result.
    FetchingRoster,
    /// Steady state.
    Streaming,
    /// Terminal.
    Closed,
}

impl SessionStage {
    /// Whether the handshake has completed.
    pub fn is_streaming(self) -> bool {
        self == SessionStage::Streaming
    }

    /// Short label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStage::Connecting => "connecting",
            SessionStage::PlaintextNegotiating => "plaintext_negotiating",
            SessionStage::TlsUpgrading => "tls_upgrading",
            SessionStage::Authenticating => "authenticating",
            SessionStage::Binding => "binding",
            SessionStage::EstablishingSession => "establishing_session",
            SessionStage::FetchingRoster => "fetching_roster",
            SessionStage::Streaming => "streaming",
            SessionStage::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity the session authenticates as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Account identifier (`local@domain`).
    pub account: String,
    /// Account secret sent through the token mechanism.
    pub secret: String,
    /// Resource requested at bind time.
    pub resource: String,
}

impl SessionConfig {
    /// Config with the default resource.
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            secret: secret.into(),
            resource: DEFAULT_RESOURCE.to_string(),
        }
    }

    /// Builder: override the bind resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }
}

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionFailure {
    /// The server refused STARTTLS.
    TlsRejected(String),
    /// The TLS collaborator could not verify the peer.
    Verification(String),
    /// The server rejected the credentials. Carries the raw `<failure>`.
    AuthRejected(String),
    /// Bind, session or roster request returned an error.
    Negotiation(String),
    /// The server sent a stream-level error.
    StreamError(String),
    /// The server closed its stream.
    StreamClosed,
    /// The transport failed.
    Transport(String),
}

impl SessionFailure {
    /// Details reported in an `auth_failure` event.
    pub fn details(&self) -> String {
        match self {
            SessionFailure::TlsRejected(raw)
            | SessionFailure::AuthRejected(raw)
            | SessionFailure::Negotiation(raw)
            | SessionFailure::StreamError(raw) => raw.clone(),
            SessionFailure::Verification(details) | SessionFailure::Transport(details) => {
                details.clone()
            }
            SessionFailure::StreamClosed => "stream closed by server".to_string(),
        }
    }

    /// Whether the server explicitly refused the credentials.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, SessionFailure::AuthRejected(_))
    }

    /// Short label used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            SessionFailure::TlsRejected(_) => "tls_rejected",
            SessionFailure::Verification(_) => "verification",
            SessionFailure::AuthRejected(_) => "auth_rejected",
            SessionFailure::Negotiation(_) => "negotiation",
            SessionFailure::StreamError(_) => "stream_error",
            SessionFailure::StreamClosed => "stream_closed",
            SessionFailure::Transport(_) => "transport",
        }
    }
}

/// Work the driver must carry out, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Write this fragment to the transport.
    Send(String),
    /// Hand the transport to the TLS collaborator, then call
    /// [`SessionMachine::tls_established`] or [`SessionMachine::tls_failed`].
    UpgradeTls,
    /// Credentials were accepted; the descriptor should be persisted.
    Authenticated,
    /// The handshake completed. Emitted exactly once.
    Established {
        /// Full identifier bound by the server.
        jid: String,
    },
    /// Deliver an event to the session's owner.
    Emit(InboundEvent),
    /// The session ended abnormally. Always followed by [`SessionAction::Close`].
    Fail(SessionFailure),
    /// Release the transport once preceding sends are flushed.
    Close,
}
