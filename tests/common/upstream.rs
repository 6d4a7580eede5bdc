//! Scripted XMPP server behind in-memory pipes.
//!
//! Each `connect` hands the session one end of a `tokio::io::duplex` pair
//! and runs a small server on the other end: STARTTLS, token auth, bind,
//! session and roster, then streaming. Tests push stanzas into a streaming
//! connection with [`FakeUpstream::deliver`] and read back what the gateway
//! sent with [`FakeUpstream::received`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use jabgate::error::SessionError;
use jabgate::session::{BoxedStream, Connector, TlsUpgrader, Upgraded};
use jabgate_proto::auth::encode_token;
use jabgate_proto::{Frame, Stanza, StreamCodec};
use parking_lot::Mutex;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

const PIPE_CAPACITY: usize = 64 * 1024;

const SERVER_HEADER: &str = "<?xml version='1.0' encoding='UTF-8'?>\
    <stream:stream from='example.com' id='T1' version='1.0' \
    xmlns:stream='http://etherx.jabber.org/streams' xmlns='jabber:client'>";

const PLAIN_FEATURES: &str = "<stream:features>\
    <starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls>\
    </stream:features>";

const AUTH_FEATURES: &str = "<stream:features>\
    <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><mechanism>X-GOOGLE-TOKEN</mechanism></mechanisms>\
    </stream:features>";

const BIND_FEATURES: &str = "<stream:features>\
    <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/><session xmlns='urn:ietf:params:xml:ns:xmpp-session'/>\
    </stream:features>";

const PROCEED: &str = "<proceed xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>";
const SUCCESS: &str = "<success xmlns='urn:ietf:params:xml:ns:xmpp-sasl'/>";
const NOT_AUTHORIZED: &str =
    "<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><not-authorized/></failure>";

/// In-process XMPP server usable as the gateway's [`Connector`].
#[derive(Clone, Default)]
pub struct FakeUpstream {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    accounts: Mutex<HashMap<String, String>>,
    contacts: Mutex<Vec<(String, String)>>,
    silent: AtomicBool,
    refuse_bind: AtomicBool,
    connections: AtomicUsize,
    streams: Mutex<HashMap<String, mpsc::UnboundedSender<String>>>,
    received: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `account` when it authenticates with `secret`.
    pub fn with_account(self, account: &str, secret: &str) -> Self {
        self.shared
            .accounts
            .lock()
            .insert(account.to_string(), secret.to_string());
        self
    }

    /// Add a named contact to every roster.
    pub fn with_contact(self, jid: &str, name: &str) -> Self {
        self.shared
            .contacts
            .lock()
            .push((jid.to_string(), name.to_string()));
        self
    }

    /// Accept connections but never answer.
    pub fn silent(self) -> Self {
        self.shared.silent.store(true, Ordering::SeqCst);
        self
    }

    /// Authenticate normally, then answer the bind request with an error.
    pub fn refusing_bind(self) -> Self {
        self.shared.refuse_bind.store(true, Ordering::SeqCst);
        self
    }

    /// Transports opened so far.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Queue a stanza for `account`'s stream. It is written once the stream
    /// is streaming. Returns false without an authenticated connection.
    pub fn deliver(&self, account: &str, stanza: &str) -> bool {
        self.shared
            .streams
            .lock()
            .get(account)
            .is_some_and(|tx| tx.send(stanza.to_string()).is_ok())
    }

    /// Drop `account`'s connection from the server side.
    pub fn disconnect(&self, account: &str) -> bool {
        self.shared.streams.lock().remove(account).is_some()
    }

    /// Message stanzas the gateway sent, in order.
    pub fn received(&self) -> Vec<String> {
        self.shared.received.lock().clone()
    }
}

#[async_trait]
impl Connector for FakeUpstream {
    async fn connect(&self) -> Result<BoxedStream, SessionError> {
        self.shared.connections.fetch_add(1, Ordering::SeqCst);
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);

        if self.shared.silent.load(Ordering::SeqCst) {
            tokio::spawn(async move {
                let mut server = server;
                let _ = tokio::io::copy(&mut server, &mut tokio::io::sink()).await;
            });
        } else {
            tokio::spawn(serve(Arc::clone(&self.shared), server));
        }
        Ok(Box::new(client))
    }
}

/// Per-connection server state.
struct Connection {
    restarts: usize,
    account: Option<String>,
    streaming: bool,
    inject: Option<mpsc::UnboundedSender<String>>,
}

async fn serve(shared: Arc<Shared>, io: DuplexStream) {
    let mut framed = Framed::new(io, StreamCodec::new());
    let (inject_tx, mut inject_rx) = mpsc::unbounded_channel::<String>();
    let mut conn = Connection {
        restarts: 0,
        account: None,
        streaming: false,
        inject: Some(inject_tx),
    };

    loop {
        let replies = tokio::select! {
            frame = framed.next() => match frame {
                Some(Ok(Frame::StreamClose)) | Some(Err(_)) | None => break,
                Some(Ok(frame)) => shared.answer(&mut conn, frame),
            },
            injected = inject_rx.recv(), if conn.streaming => match injected {
                Some(stanza) => vec![stanza],
                None => break,
            },
        };
        for reply in replies {
            if framed.send(reply).await.is_err() {
                return;
            }
        }
    }
}

impl Shared {
    fn answer(&self, conn: &mut Connection, frame: Frame) -> Vec<String> {
        match frame {
            Frame::StreamOpen { .. } => {
                let features = match conn.restarts {
                    0 => PLAIN_FEATURES,
                    1 => AUTH_FEATURES,
                    _ => BIND_FEATURES,
                };
                conn.restarts += 1;
                vec![format!("{SERVER_HEADER}{features}")]
            }
            Frame::Stanza(stanza) => self.answer_stanza(conn, &stanza),
            Frame::StreamClose | Frame::Malformed { .. } => vec![],
        }
    }

    fn answer_stanza(&self, conn: &mut Connection, stanza: &Stanza) -> Vec<String> {
        let el = stanza.element();
        match stanza.kind() {
            "starttls" => vec![PROCEED.to_string()],
            "auth" => {
                let payload = el.text().trim();
                let account = self
                    .accounts
                    .lock()
                    .iter()
                    .find(|(account, secret)| encode_token(account, secret) == payload)
                    .map(|(account, _)| account.clone());
                match account {
                    Some(account) => {
                        if let Some(tx) = conn.inject.take() {
                            self.streams.lock().insert(account.clone(), tx);
                        }
                        conn.account = Some(account);
                        vec![SUCCESS.to_string()]
                    }
                    None => vec![NOT_AUTHORIZED.to_string()],
                }
            }
            "iq" => match el.attr("id") {
                Some("bind_resource") if self.refuse_bind.load(Ordering::SeqCst) => {
                    vec!["<iq type='error' id='bind_resource'/>".to_string()]
                }
                Some("bind_resource") => {
                    let resource = el
                        .child("bind")
                        .and_then(|bind| bind.child_text("resource"))
                        .unwrap_or("res");
                    let account = conn.account.clone().unwrap_or_default();
                    vec![format!(
                        "<iq type='result' id='bind_resource'>\
                         <bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'><jid>{account}/{resource}</jid></bind></iq>"
                    )]
                }
                Some("session") => vec!["<iq type='result' id='session'/>".to_string()],
                Some("roster") => {
                    let items: String = self
                        .contacts
                        .lock()
                        .iter()
                        .map(|(jid, name)| {
                            format!("<item jid='{jid}' name='{name}' subscription='both'/>")
                        })
                        .collect();
                    vec![format!(
                        "<iq type='result' id='roster'><query xmlns='jabber:iq:roster'>{items}</query></iq>"
                    )]
                }
                _ => vec![],
            },
            "presence" => {
                conn.streaming = true;
                vec![]
            }
            "message" => {
                self.received.lock().push(stanza.raw().to_string());
                vec![]
            }
            _ => vec![],
        }
    }
}

/// Upgrader that keeps the plaintext pipe and reports the given verification.
pub struct PassthroughTls {
    pub verified: bool,
}

impl PassthroughTls {
    pub fn verified() -> Self {
        Self { verified: true }
    }

    pub fn unverified() -> Self {
        Self { verified: false }
    }
}

#[async_trait]
impl TlsUpgrader for PassthroughTls {
    async fn upgrade(
        &self,
        stream: BoxedStream,
        _server_name: &str,
    ) -> Result<Upgraded, SessionError> {
        Ok(Upgraded {
            stream,
            verified: self.verified,
        })
    }
}
