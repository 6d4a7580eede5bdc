//! Session state machine core.

use crate::codec::Frame;
use crate::error::{ProtocolError, Result};
use crate::jid;
use crate::roster::Roster;
use crate::stanza;

use super::{SessionAction, SessionConfig, SessionFailure, SessionStage};

/// Sans-IO state machine for one client session.
#[derive(Clone, Debug)]
pub struct SessionMachine {
    pub(super) config: SessionConfig,
    pub(super) domain: String,
    pub(super) stage: SessionStage,
    /// Set once the server accepted our credentials on this transport.
    pub(super) authenticated: bool,
    /// Whether the current stage's request has gone out.
    pub(super) request_sent: bool,
    pub(super) jid: Option<String>,
    pub(super) roster: Roster,
}

impl SessionMachine {
    /// Create a machine for the given identity.
    ///
    /// Fails when the account identifier has no domain to address.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let domain = jid::domain_of(&config.account)
            .ok_or_else(|| ProtocolError::MissingDomain(config.account.clone()))?
            .to_string();
        Ok(Self {
            config,
            domain,
            stage: SessionStage::Connecting,
            authenticated: false,
            request_sent: false,
            jid: None,
            roster: Roster::new(),
        })
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    /// Domain the stream header is addressed to.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Account this session authenticates as.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.config.account
    }

    /// Whether the server accepted the credentials on this transport.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Full identifier bound by the server, once known.
    #[must_use]
    pub fn bound_jid(&self) -> Option<&str> {
        self.jid.as_deref()
    }

    /// The session's contact list.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The transport is open. Returns the opening stream header.
    #[must_use]
    pub fn connected(&mut self) -> Vec<SessionAction> {
        if self.stage != SessionStage::Connecting {
            return vec![];
        }
        self.stage = SessionStage::PlaintextNegotiating;
        self.request_sent = false;
        vec![SessionAction::Send(stanza::stream_header(&self.domain))]
    }

    /// Feed one decoded frame.
    #[must_use]
    pub fn feed(&mut self, frame: &Frame) -> Vec<SessionAction> {
        if self.stage == SessionStage::Closed {
            return vec![];
        }

        let stanza = match frame {
            Frame::StreamOpen { .. } | Frame::Malformed { .. } => return vec![],
            Frame::StreamClose => return self.fail(SessionFailure::StreamClosed, false),
            Frame::Stanza(stanza) => stanza,
        };

        if stanza.element().name() == "stream:error" {
            return self.fail(SessionFailure::StreamError(stanza.raw().to_string()), false);
        }

        match self.stage {
            SessionStage::Connecting | SessionStage::TlsUpgrading | SessionStage::Closed => vec![],
            SessionStage::PlaintextNegotiating => self.handle_plaintext(stanza),
            SessionStage::Authenticating => self.handle_authentication(stanza),
            SessionStage::Binding => self.handle_binding(stanza),
            SessionStage::EstablishingSession => self.handle_session(stanza),
            SessionStage::FetchingRoster => self.handle_roster(stanza),
            SessionStage::Streaming => self.handle_streaming(stanza),
        }
    }

    /// The TLS collaborator returned a verified encrypted stream.
    ///
    /// The stream restarts over the new transport.
    #[must_use]
    pub fn tls_established(&mut self) -> Vec<SessionAction> {
        if self.stage != SessionStage::TlsUpgrading {
            return vec![];
        }
        self.stage = SessionStage::Authenticating;
        self.request_sent = false;
        vec![SessionAction::Send(stanza::stream_header(&self.domain))]
    }

    /// The TLS collaborator failed or could not verify the peer.
    ///
    /// Nothing more is written; the transport is simply dropped.
    #[must_use]
    pub fn tls_failed(&mut self, details: impl Into<String>) -> Vec<SessionAction> {
        if self.stage != SessionStage::TlsUpgrading {
            return vec![];
        }
        self.fail(SessionFailure::Verification(details.into()), false)
    }

    /// The transport broke underneath the session.
    #[must_use]
    pub fn transport_lost(&mut self, details: impl Into<String>) -> Vec<SessionAction> {
        if self.stage == SessionStage::Closed {
            return vec![];
        }
        self.fail(SessionFailure::Transport(details.into()), false)
    }

    /// Build an outbound chat message, tagged with the destination's OTR state.
    ///
    /// Returns `None` until the session is streaming.
    #[must_use]
    pub fn compose_message(&self, to: &str, body: &str) -> Option<String> {
        if self.stage != SessionStage::Streaming {
            return None;
        }
        let from = self.jid.as_deref()?;
        Some(stanza::message(from, to, body, self.roster.otr(to)))
    }

    /// End the session from any stage. Calling it again does nothing.
    #[must_use]
    pub fn close(&mut self) -> Vec<SessionAction> {
        if self.stage == SessionStage::Closed {
            return vec![];
        }
        let stream_open = self.stage != SessionStage::Connecting
            && self.stage != SessionStage::TlsUpgrading;
        self.stage = SessionStage::Closed;

        let mut actions = Vec::with_capacity(2);
        if stream_open {
            actions.push(SessionAction::Send(stanza::stream_close()));
        }
        actions.push(SessionAction::Close);
        actions
    }

    /// Move to `Closed` and report `failure`.
    pub(super) fn fail(
        &mut self,
        failure: SessionFailure,
        send_close: bool,
    ) -> Vec<SessionAction> {
        self.stage = SessionStage::Closed;
        let mut actions = Vec::with_capacity(3);
        if send_close {
            actions.push(SessionAction::Send(stanza::stream_close()));
        }
        actions.push(SessionAction::Fail(failure));
        actions.push(SessionAction::Close);
        actions
    }
}
