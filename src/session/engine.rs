//! Per-session driver task.
//!
//! The driver owns the transport and the [`SessionMachine`]. It feeds decoded
//! frames into the machine and carries out the returned actions in order.
//! Everything else talks to it through channels:
//!
//! - commands in (`mpsc`), answered through a `oneshot` each
//! - events out (unbounded `mpsc`), so a slow consumer never stalls reads
//! - one readiness signal (`oneshot`) when the session starts streaming
//! - a `CancellationToken` for logout

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jabgate_proto::{
    Frame, InboundEvent, RosterEntry, SessionAction, SessionConfig, SessionMachine, StreamCodec,
};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::connector::{BoxedStream, Connector};
use super::tls::{TlsUpgrader, Upgraded};
use crate::config::UpstreamConfig;
use crate::error::SessionError;
use crate::metrics;
use crate::store::{SessionStore, SharedDescriptor};
use crate::telemetry::spans;

/// Pending commands per session before senders wait.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

type Transport = Framed<BoxedStream, StreamCodec>;

/// Handshake parameters shared by every session.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub resource: String,
    pub handshake_timeout: Duration,
    /// Overrides the account domain as the TLS verification name.
    pub tls_server_name: Option<String>,
}

impl From<&UpstreamConfig> for SessionSettings {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            resource: config.resource.clone(),
            handshake_timeout: config.handshake_timeout(),
            tls_server_name: config.tls_server_name.clone(),
        }
    }
}

/// Requests a running session answers.
#[derive(Debug)]
pub enum SessionCommand {
    /// Send a chat message.
    Send {
        to: String,
        body: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Copy of the current roster.
    Roster {
        reply: oneshot::Sender<Vec<RosterEntry>>,
    },
    /// Roster name of a contact, or its bare identifier.
    DisplayName {
        jid: String,
        reply: oneshot::Sender<String>,
    },
}

/// Channels to a freshly spawned session.
pub struct Spawned {
    pub commands: mpsc::Sender<SessionCommand>,
    pub events: mpsc::UnboundedReceiver<InboundEvent>,
    /// Bound identifier once streaming, or why the handshake failed.
    pub ready: oneshot::Receiver<Result<String, SessionError>>,
}

/// How a session came to be started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOrigin {
    /// A client login whose token is returned once streaming.
    Login,
    /// A descriptor persisted by an earlier run.
    Restore,
}

/// One session's driver, ready to spawn.
pub struct SessionEngine {
    descriptor: SharedDescriptor,
    origin: SessionOrigin,
    connector: Arc<dyn Connector>,
    upgrader: Arc<dyn TlsUpgrader>,
    store: Arc<dyn SessionStore>,
    settings: SessionSettings,
    cancel: CancellationToken,
}

impl SessionEngine {
    pub fn new(
        descriptor: SharedDescriptor,
        origin: SessionOrigin,
        connector: Arc<dyn Connector>,
        upgrader: Arc<dyn TlsUpgrader>,
        store: Arc<dyn SessionStore>,
        settings: SessionSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            descriptor,
            origin,
            connector,
            upgrader,
            store,
            settings,
            cancel,
        }
    }

    /// Start the driver on the runtime.
    pub fn spawn(self) -> Spawned {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let span = {
            let d = self.descriptor.lock();
            spans::session(&d.token, &d.account)
        };
        tokio::spawn(self.run(command_rx, event_tx, ready_tx).instrument(span));

        Spawned {
            commands: command_tx,
            events: event_rx,
            ready: ready_rx,
        }
    }

    async fn run(
        self,
        mut commands: mpsc::Receiver<SessionCommand>,
        events: mpsc::UnboundedSender<InboundEvent>,
        ready: oneshot::Sender<Result<String, SessionError>>,
    ) {
        let mut ready = Some(ready);
        let result = self.drive(&mut commands, &events, &mut ready).await;

        let Some(ready) = ready.take() else {
            match result {
                Ok(()) => debug!("Session closed"),
                Err(err) => warn!(error = %err, "Session lost"),
            }
            return;
        };

        // The handshake never completed. A login's token was never handed
        // out, so its descriptor goes; a restored one survives anything but
        // rejected credentials.
        let err = result.err().unwrap_or(SessionError::Closed);
        if self.origin == SessionOrigin::Login || matches!(err, SessionError::AuthRejected(_)) {
            let token = self.descriptor.lock().token.clone();
            if let Err(e) = self.store.remove(&token).await {
                warn!(error = %e, "Failed to remove unestablished session");
            }
        }

        warn!(error = %err, code = err.error_code(), "Session failed before streaming");
        metrics::record_handshake_failure(err.error_code());
        let _ = events.send(InboundEvent::AuthFailure {
            details: err.details(),
        });
        let _ = ready.send(Err(err));
    }

    async fn drive(
        &self,
        commands: &mut mpsc::Receiver<SessionCommand>,
        events: &mpsc::UnboundedSender<InboundEvent>,
        ready: &mut Option<oneshot::Sender<Result<String, SessionError>>>,
    ) -> Result<(), SessionError> {
        let config = {
            let d = self.descriptor.lock();
            SessionConfig::new(d.account.clone(), d.secret.clone())
                .with_resource(self.settings.resource.clone())
        };
        let mut machine = SessionMachine::new(config)?;
        let deadline = Instant::now() + self.settings.handshake_timeout;
        let timed_out = || SessionError::HandshakeTimeout(self.settings.handshake_timeout.as_secs());

        let stream = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            _ = sleep_until(deadline) => return Err(timed_out()),
            stream = self.connector.connect() => stream?,
        };

        let mut framed: Transport = Framed::new(stream, StreamCodec::new());
        let mut pending: VecDeque<SessionAction> = machine.connected().into();
        let mut failure: Option<SessionError> = None;
        let mut streaming = false;

        loop {
            while let Some(action) = pending.pop_front() {
                match action {
                    SessionAction::Send(fragment) => framed.send(fragment).await?,
                    SessionAction::UpgradeTls => {
                        let parts = framed.into_parts();
                        if !parts.read_buf.is_empty() {
                            warn!(bytes = parts.read_buf.len(), "Discarding plaintext read ahead of TLS");
                        }
                        let server_name = self
                            .settings
                            .tls_server_name
                            .clone()
                            .unwrap_or_else(|| machine.domain().to_string());

                        let upgraded = tokio::select! {
                            _ = self.cancel.cancelled() => return Ok(()),
                            _ = sleep_until(deadline) => return Err(timed_out()),
                            upgraded = self.upgrader.upgrade(parts.io, &server_name) => upgraded,
                        };
                        match upgraded {
                            Ok(Upgraded { stream, verified: true }) => {
                                debug!(server_name = %server_name, "Transport encrypted");
                                framed = Framed::new(stream, StreamCodec::new());
                                pending.extend(machine.tls_established());
                            }
                            Ok(Upgraded { verified: false, .. }) => {
                                let details = format!("{server_name}: peer not verified");
                                let _ = machine.tls_failed(details.clone());
                                return Err(SessionError::Verification(details));
                            }
                            Err(e) => {
                                let _ = machine.tls_failed(e.to_string());
                                return Err(e);
                            }
                        }
                    }
                    SessionAction::Authenticated => {
                        let snapshot = {
                            let mut d = self.descriptor.lock();
                            d.authenticated = true;
                            d.clone()
                        };
                        if let Err(e) = self.store.save(&snapshot).await {
                            warn!(error = %e, "Failed to persist authenticated session");
                        }
                    }
                    SessionAction::Established { jid } => {
                        streaming = true;
                        info!(jid = %jid, "Session streaming");
                        if let Some(ready) = ready.take() {
                            let _ = ready.send(Ok(jid));
                        }
                    }
                    SessionAction::Emit(event) => {
                        let _ = events.send(event);
                    }
                    SessionAction::Fail(f) => {
                        debug!(reason = f.reason(), "Session failing");
                        failure = Some(f.into());
                    }
                    SessionAction::Close => {
                        let _ = SinkExt::<String>::flush(&mut framed).await;
                        let _ = framed.get_mut().shutdown().await;
                        return failure.map_or(Ok(()), Err);
                    }
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    pending.extend(machine.close());
                    if pending.is_empty() {
                        return Ok(());
                    }
                }
                _ = sleep_until(deadline), if !streaming => {
                    return Err(timed_out());
                }
                command = commands.recv() => match command {
                    Some(command) => {
                        Self::handle_command(command, &mut machine, &mut framed, &mut pending).await;
                    }
                    None => pending.extend(machine.close()),
                },
                frame = framed.next() => match frame {
                    Some(Ok(frame)) => {
                        if let Frame::Malformed { reason } = &frame {
                            warn!(reason = %reason, "Discarding malformed stream data");
                        }
                        pending.extend(machine.feed(&frame));
                    }
                    Some(Err(e)) => pending.extend(machine.transport_lost(e.to_string())),
                    None => pending.extend(machine.transport_lost("connection closed by peer")),
                },
            }
        }
    }

    async fn handle_command(
        command: SessionCommand,
        machine: &mut SessionMachine,
        framed: &mut Transport,
        pending: &mut VecDeque<SessionAction>,
    ) {
        match command {
            SessionCommand::Send { to, body, reply } => {
                let Some(stanza) = machine.compose_message(&to, &body) else {
                    let _ = reply.send(Err(SessionError::Closed));
                    return;
                };
                match framed.send(stanza).await {
                    Ok(()) => {
                        debug!(to = %to, "Message sent");
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let details = e.to_string();
                        let _ = reply.send(Err(SessionError::Transport(details.clone())));
                        pending.extend(machine.transport_lost(details));
                    }
                }
            }
            SessionCommand::Roster { reply } => {
                let _ = reply.send(machine.roster().snapshot());
            }
            SessionCommand::DisplayName { jid, reply } => {
                let _ = reply.send(machine.roster().display_name(&jid).to_string());
            }
        }
    }
}
