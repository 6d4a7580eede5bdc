//! Durable session state.
//!
//! Two kinds of data survive a restart:
//! - Session descriptors, keyed by token, so every session can be rebuilt
//!   from stored credentials at startup.
//! - A per-account queue of message events received while no push endpoint
//!   was registered, drained by the client on demand.
//!
//! Any backend offering a keyed map, a token set and an ordered list per
//! account can implement [`SessionStore`].

mod memory;
mod redb;

pub use self::memory::MemoryStore;
pub use self::redb::RedbStore;

use std::sync::Arc;

use async_trait::async_trait;
use jabgate_proto::MessageEvent;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// How message events are delivered to a registered endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// POST the serialized event itself.
    #[default]
    Raw,
    /// POST a short notification naming the sender, keep the event queued.
    Summarized,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Raw => "raw",
            DeliveryMode::Summarized => "summarized",
        }
    }
}

/// Everything needed to rebuild a session after a restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Opaque capability handed to the client at login.
    pub token: String,
    /// Account identifier (`user@domain`).
    pub account: String,
    /// Credential presented to the server.
    pub secret: String,
    /// Push endpoint, when one is registered.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Delivery mode for the endpoint.
    #[serde(default)]
    pub delivery: DeliveryMode,
    /// Whether the server ever accepted these credentials.
    #[serde(default)]
    pub authenticated: bool,
}

impl SessionDescriptor {
    pub fn new(token: impl Into<String>, account: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            account: account.into(),
            secret: secret.into(),
            endpoint: None,
            delivery: DeliveryMode::Raw,
            authenticated: false,
        }
    }
}

/// Descriptor shared between a session's driver, its event pump and the
/// gateway. Never hold the lock across an await.
pub type SharedDescriptor = Arc<Mutex<SessionDescriptor>>;

/// Storage interface for descriptors and queued events.
///
/// Calls may block on disk; implementations must not stall the runtime.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace the descriptor for `descriptor.token`.
    async fn save(&self, descriptor: &SessionDescriptor) -> Result<(), StoreError>;

    /// Fetch one descriptor.
    async fn load(&self, token: &str) -> Result<Option<SessionDescriptor>, StoreError>;

    /// Every descriptor marked resumable, for startup recovery.
    async fn load_all(&self) -> Result<Vec<SessionDescriptor>, StoreError>;

    /// Forget a descriptor. Removing an unknown token is not an error.
    async fn remove(&self, token: &str) -> Result<bool, StoreError>;

    /// Append an event to the account's queue.
    async fn enqueue(&self, account: &str, event: &MessageEvent) -> Result<(), StoreError>;

    /// Return and remove the account's whole queue, oldest first.
    async fn drain(&self, account: &str) -> Result<Vec<MessageEvent>, StoreError>;
}
