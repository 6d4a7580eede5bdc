//! Gateway-side handle to a running session.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use jabgate_proto::{RosterEntry, jid};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::engine::SessionCommand;
use crate::error::SessionError;
use crate::push::DisplayNames;
use crate::store::{SessionDescriptor, SharedDescriptor};

/// Cheap reference to a live session's driver.
pub struct SessionHandle {
    token: String,
    descriptor: SharedDescriptor,
    commands: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    logged_out: AtomicBool,
}

impl SessionHandle {
    pub fn new(
        descriptor: SharedDescriptor,
        commands: mpsc::Sender<SessionCommand>,
        cancel: CancellationToken,
    ) -> Self {
        let token = descriptor.lock().token.clone();
        Self {
            token,
            descriptor,
            commands,
            cancel,
            logged_out: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn descriptor(&self) -> &SharedDescriptor {
        &self.descriptor
    }

    /// Copy of the descriptor as it stands now.
    pub fn snapshot(&self) -> SessionDescriptor {
        self.descriptor.lock().clone()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the stream is being closed, by logout or shutdown.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Ask the driver to close the stream. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Close the stream for good. The descriptor must not be written again.
    pub fn log_out(&self) {
        self.logged_out.store(true, Ordering::SeqCst);
        self.cancel();
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    /// Send a chat message to `to`.
    pub async fn send_message(&self, to: &str, body: &str) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Send {
                to: to.to_string(),
                body: body.to_string(),
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Current roster entries.
    pub async fn roster(&self) -> Result<Vec<RosterEntry>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Roster { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

#[async_trait]
impl DisplayNames for SessionHandle {
    async fn display_name(&self, contact: &str) -> String {
        let (reply, rx) = oneshot::channel();
        let asked = self
            .commands
            .send(SessionCommand::DisplayName {
                jid: contact.to_string(),
                reply,
            })
            .await;
        match asked {
            Ok(()) => rx.await.unwrap_or_else(|_| jid::bare(contact).to_string()),
            Err(_) => jid::bare(contact).to_string(),
        }
    }
}
