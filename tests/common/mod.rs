//! Integration test common infrastructure.
//!
//! Wires a [`SessionRegistry`] to an in-process XMPP server and a recording
//! push client, and provides polling helpers for asynchronous outcomes.

pub mod push;
pub mod upstream;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use jabgate::SessionRegistry;
use jabgate::session::{SessionSettings, TlsUpgrader};
use jabgate::store::MemoryStore;

#[allow(unused_imports)]
pub use push::RecordingPush;
#[allow(unused_imports)]
pub use upstream::{FakeUpstream, PassthroughTls};

pub const ACCOUNT: &str = "a@example.com";
pub const SECRET: &str = "S";
pub const CONTACT: &str = "b@example.com";

/// Incoming chat stanza from the test contact.
#[allow(dead_code)]
pub fn chat_from_contact(body: &str) -> String {
    format!("<message from='{CONTACT}/res' to='{ACCOUNT}/jabgate' type='chat'><body>{body}</body></message>")
}

pub fn settings(handshake_timeout: Duration) -> SessionSettings {
    SessionSettings {
        resource: "jabgate".to_string(),
        handshake_timeout,
        tls_server_name: None,
    }
}

/// A registry plus handles on everything it talks to.
pub struct Gateway {
    pub registry: SessionRegistry,
    pub upstream: FakeUpstream,
    pub push: Arc<RecordingPush>,
    pub store: Arc<MemoryStore>,
}

impl Gateway {
    /// Gateway whose upstream knows the test account and contact.
    pub fn new() -> Self {
        let upstream = FakeUpstream::new()
            .with_account(ACCOUNT, SECRET)
            .with_contact(CONTACT, "Bea");
        Self::build(
            upstream,
            Arc::new(RecordingPush::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(PassthroughTls::verified()),
            Duration::from_secs(5),
        )
    }

    pub fn build(
        upstream: FakeUpstream,
        push: Arc<RecordingPush>,
        store: Arc<MemoryStore>,
        upgrader: Arc<dyn TlsUpgrader>,
        handshake_timeout: Duration,
    ) -> Self {
        let registry = SessionRegistry::new(
            store.clone(),
            push.clone(),
            Arc::new(upstream.clone()),
            upgrader,
            settings(handshake_timeout),
        );
        Self {
            registry,
            upstream,
            push,
            store,
        }
    }

    /// A second gateway over the same store and upstream, as after a restart.
    #[allow(dead_code)]
    pub fn restarted(&self) -> Self {
        Self::build(
            self.upstream.clone(),
            Arc::new(RecordingPush::new()),
            Arc::clone(&self.store),
            Arc::new(PassthroughTls::verified()),
            Duration::from_secs(5),
        )
    }
}

/// Poll `check` until it holds or two seconds pass.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
