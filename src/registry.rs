//! Live sessions by token.
//!
//! The registry is the gateway's only shared state: a token -> session map,
//! a credentials -> token map for recycling logins, and the collaborators
//! every new session is built from. Each live session has two tasks, its
//! driver and an event pump that hands message events to the dispatcher.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use jabgate_proto::{InboundEvent, MessageEvent, RosterEntry};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::error::SessionError;
use crate::metrics;
use crate::push::{NotificationDispatcher, PushClient};
use crate::session::{
    Connector, SessionEngine, SessionHandle, SessionOrigin, SessionSettings, Spawned,
    TlsUpgrader,
};
use crate::store::{SessionDescriptor, SessionStore, SharedDescriptor};
use crate::telemetry::spans;
use crate::token;

/// Registry of running sessions. Clones share the same state.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: DashMap<String, Arc<SessionHandle>>,
    credentials: DashMap<(String, String), String>,
    store: Arc<dyn SessionStore>,
    dispatcher: NotificationDispatcher,
    connector: Arc<dyn Connector>,
    upgrader: Arc<dyn TlsUpgrader>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn SessionStore>,
        push: Arc<dyn PushClient>,
        connector: Arc<dyn Connector>,
        upgrader: Arc<dyn TlsUpgrader>,
        settings: SessionSettings,
    ) -> Self {
        let dispatcher = NotificationDispatcher::new(push, Arc::clone(&store));
        Self {
            inner: Arc::new(Inner {
                sessions: DashMap::new(),
                credentials: DashMap::new(),
                store,
                dispatcher,
                connector,
                upgrader,
                settings,
            }),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    pub fn get(&self, token: &str) -> Option<Arc<SessionHandle>> {
        self.inner.sessions.get(token).map(|h| Arc::clone(h.value()))
    }

    /// Log in, reusing the live session for the same account and secret.
    ///
    /// Returns the session token once the session is streaming.
    pub async fn login(&self, account: &str, secret: &str) -> Result<String, SessionError> {
        let key = (account.to_string(), secret.to_string());
        let existing = self.inner.credentials.get(&key).map(|t| t.value().clone());
        if let Some(token) = existing
            && self.inner.sessions.contains_key(&token)
        {
            debug!(account = %account, "Recycling live session");
            return Ok(token);
        }

        let token = self.fresh_token();
        self.start(
            SessionDescriptor::new(token.clone(), account, secret),
            SessionOrigin::Login,
        )
        .await?;
        info!(account = %account, "Session logged in");
        Ok(token)
    }

    /// Rebuild a persisted session.
    ///
    /// Rejected credentials are dropped from the store by the driver; an
    /// unusable account identifier is dropped here. Other failures keep
    /// the descriptor for the next start.
    pub async fn restore(&self, descriptor: SessionDescriptor) -> Result<(), SessionError> {
        let token = descriptor.token.clone();
        let result = self.start(descriptor, SessionOrigin::Restore).await;
        if let Err(SessionError::InvalidAccount(_)) = &result
            && let Err(e) = self.inner.store.remove(&token).await
        {
            warn!(error = %e, "Failed to drop unusable session");
        }
        result
    }

    /// Restore every persisted session concurrently. Returns how many came up.
    pub async fn restore_all(&self) -> Result<usize, SessionError> {
        let descriptors = self.inner.store.load_all().await?;
        let total = descriptors.len();

        let results = join_all(descriptors.into_iter().map(|descriptor| async move {
            let account = descriptor.account.clone();
            (account, self.restore(descriptor).await)
        }))
        .await;

        let mut restored = 0;
        for (account, result) in results {
            match result {
                Ok(()) => restored += 1,
                Err(e) => warn!(account = %account, error = %e, "Failed to restore session"),
            }
        }
        info!(restored, total, "Session restore complete");
        Ok(restored)
    }

    /// Send a chat message through a session.
    pub async fn send_message(&self, token: &str, to: &str, body: &str) -> Result<(), SessionError> {
        self.handle(token)?.send_message(to, body).await
    }

    /// Current roster of a session.
    pub async fn roster(&self, token: &str) -> Result<Vec<RosterEntry>, SessionError> {
        self.handle(token)?.roster().await
    }

    /// Return and clear the queued message events of a session's account.
    pub async fn drain_queue(&self, token: &str) -> Result<Vec<MessageEvent>, SessionError> {
        let account = self.handle(token)?.snapshot().account;
        Ok(self.inner.store.drain(&account).await?)
    }

    /// Register a push endpoint for a session.
    pub async fn register_endpoint(&self, token: &str, url: &str) -> Result<(), SessionError> {
        let handle = self.handle(token)?;
        self.inner
            .dispatcher
            .register_endpoint(handle.descriptor(), url, handle.cancel_token())
            .await?;
        // A logout that finished while the save was in flight removed the
        // descriptor before it was written back.
        if handle.is_logged_out() {
            self.inner.store.remove(token).await?;
            return Err(SessionError::UnknownToken);
        }
        Ok(())
    }

    /// End a session and forget its descriptor.
    ///
    /// Safe to repeat. Returns whether a live session was stopped.
    pub async fn logout(&self, token: &str) -> Result<bool, SessionError> {
        let removed = self.inner.sessions.remove(token).map(|(_, handle)| handle);
        if let Some(handle) = &removed {
            handle.log_out();
            self.inner.forget_credentials(handle);
            info!(account = %handle.snapshot().account, "Session logged out");
        }
        self.inner.store.remove(token).await?;
        Ok(removed.is_some())
    }

    /// Close every live stream, leaving descriptors for the next start.
    pub fn close_all(&self) {
        for entry in self.inner.sessions.iter() {
            entry.value().cancel();
        }
    }

    fn handle(&self, token: &str) -> Result<Arc<SessionHandle>, SessionError> {
        self.get(token).ok_or(SessionError::UnknownToken)
    }

    fn fresh_token(&self) -> String {
        loop {
            let token = token::generate();
            if !self.inner.sessions.contains_key(&token) {
                return token;
            }
        }
    }

    async fn start(
        &self,
        descriptor: SessionDescriptor,
        origin: SessionOrigin,
    ) -> Result<(), SessionError> {
        let span = spans::session(&descriptor.token, &descriptor.account);
        let key = (descriptor.account.clone(), descriptor.secret.clone());
        let token = descriptor.token.clone();
        let descriptor: SharedDescriptor = Arc::new(Mutex::new(descriptor));
        let cancel = CancellationToken::new();

        let Spawned {
            commands,
            events,
            ready,
        } = SessionEngine::new(
            Arc::clone(&descriptor),
            origin,
            Arc::clone(&self.inner.connector),
            Arc::clone(&self.inner.upgrader),
            Arc::clone(&self.inner.store),
            self.inner.settings.clone(),
            cancel.clone(),
        )
        .spawn();

        match ready.await {
            Ok(Ok(_jid)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(SessionError::Closed),
        }

        let handle = Arc::new(SessionHandle::new(descriptor, commands, cancel));
        self.inner.sessions.insert(token.clone(), Arc::clone(&handle));
        self.inner.credentials.insert(key, token);
        metrics::session_started();

        tokio::spawn(pump(Arc::clone(&self.inner), handle, events).instrument(span));
        Ok(())
    }
}

impl Inner {
    fn forget_credentials(&self, handle: &SessionHandle) {
        let key = {
            let d = handle.descriptor().lock();
            (d.account.clone(), d.secret.clone())
        };
        self.credentials.remove_if(&key, |_, token| token == handle.token());
    }
}

/// Drain a session's events until its driver exits.
async fn pump(
    inner: Arc<Inner>,
    handle: Arc<SessionHandle>,
    mut events: mpsc::UnboundedReceiver<InboundEvent>,
) {
    while let Some(event) = events.recv().await {
        if handle.is_cancelled() {
            break;
        }
        metrics::record_event(event.kind());
        match event {
            InboundEvent::Message(message) => {
                let outcome = inner
                    .dispatcher
                    .dispatch(
                        handle.descriptor(),
                        &message,
                        handle.as_ref(),
                        handle.cancel_token(),
                    )
                    .await;
                metrics::record_delivery(outcome.as_str());
                debug!(from = %message.from, outcome = outcome.as_str(), "Message dispatched");
            }
            InboundEvent::Presence(presence) => {
                debug!(jid = %presence.jid, kind = ?presence.kind, "Presence update");
            }
            InboundEvent::AuthFailure { details } => {
                warn!(details = %details, "Session reported auth failure");
            }
        }
    }

    metrics::session_ended();
    inner
        .sessions
        .remove_if(handle.token(), |_, live| Arc::ptr_eq(live, &handle));
    inner.forget_credentials(&handle);
    // A dispatch racing logout may have written the descriptor back.
    if handle.is_logged_out()
        && let Err(e) = inner.store.remove(handle.token()).await
    {
        warn!(error = %e, "Failed to remove logged out session");
    }
    debug!("Session pump stopped");
}
