//! Per-stage stanza handlers.

use crate::codec::Stanza;
use crate::element::Element;
use crate::event::{InboundEvent, MessageEvent, PresenceEvent};
use crate::jid;
use crate::stanza::{self, BIND_ID, NS_NOSAVE, NS_ROSTER, NS_TLS, ROSTER_ID, SESSION_ID};

use super::machine::SessionMachine;
use super::{SessionAction, SessionFailure, SessionStage};

const NS_PING: &str = "urn:xmpp:ping";
const NS_AVATAR_UPDATE: &str = "vcard-temp:x:update";

/// Outcome of an iq addressed to one of our requests.
enum Reply<'a> {
    Result(&'a Element),
    Error,
    Unrelated,
}

fn reply_to<'a>(stanza: &'a Stanza, id: &str) -> Reply<'a> {
    let el = stanza.element();
    if stanza.kind() != "iq" || el.attr("id") != Some(id) {
        return Reply::Unrelated;
    }
    match el.attr("type") {
        Some("result") => Reply::Result(el),
        Some("error") => Reply::Error,
        _ => Reply::Unrelated,
    }
}

/// Whether `el` declares `ns` as its default or a prefixed namespace.
fn declares(el: &Element, ns: &str) -> bool {
    el.attrs()
        .iter()
        .any(|(k, v)| (k == "xmlns" || k.starts_with("xmlns:")) && v == ns)
}

impl SessionMachine {
    pub(super) fn handle_plaintext(&mut self, stanza: &Stanza) -> Vec<SessionAction> {
        match stanza.kind() {
            "features" if !self.request_sent => {
                self.request_sent = true;
                vec![SessionAction::Send(stanza::starttls())]
            }
            "proceed" => {
                self.stage = SessionStage::TlsUpgrading;
                vec![SessionAction::UpgradeTls]
            }
            "failure" if declares(stanza.element(), NS_TLS) => {
                self.fail(SessionFailure::TlsRejected(stanza.raw().to_string()), false)
            }
            _ => vec![],
        }
    }

    pub(super) fn handle_authentication(&mut self, stanza: &Stanza) -> Vec<SessionAction> {
        match stanza.kind() {
            "features" if self.authenticated => {
                self.stage = SessionStage::Binding;
                self.request_sent = true;
                vec![SessionAction::Send(stanza::bind(&self.config.resource))]
            }
            "features" if !self.request_sent => {
                self.request_sent = true;
                vec![SessionAction::Send(stanza::auth(
                    &self.config.account,
                    &self.config.secret,
                ))]
            }
            "success" => {
                self.authenticated = true;
                self.request_sent = false;
                // Restart the stream; the next features announcement leads to bind.
                vec![
                    SessionAction::Authenticated,
                    SessionAction::Send(stanza::stream_header(&self.domain)),
                ]
            }
            "failure" => self.fail(SessionFailure::AuthRejected(stanza.raw().to_string()), true),
            _ => vec![],
        }
    }

    pub(super) fn handle_binding(&mut self, stanza: &Stanza) -> Vec<SessionAction> {
        match reply_to(stanza, BIND_ID) {
            Reply::Result(el) => {
                let bound = el
                    .child("bind")
                    .and_then(|bind| bind.child_text("jid"))
                    .map(str::trim)
                    .filter(|jid| !jid.is_empty());
                let Some(bound) = bound else {
                    return self
                        .fail(SessionFailure::Negotiation(stanza.raw().to_string()), true);
                };
                self.jid = Some(bound.to_string());
                self.stage = SessionStage::EstablishingSession;
                vec![SessionAction::Send(stanza::session(&self.domain))]
            }
            Reply::Error => self.fail(SessionFailure::Negotiation(stanza.raw().to_string()), true),
            Reply::Unrelated => vec![],
        }
    }

    pub(super) fn handle_session(&mut self, stanza: &Stanza) -> Vec<SessionAction> {
        match reply_to(stanza, SESSION_ID) {
            Reply::Result(_) => {
                self.stage = SessionStage::FetchingRoster;
                let jid = self.jid.clone().unwrap_or_default();
                vec![SessionAction::Send(stanza::roster_get(&jid))]
            }
            Reply::Error => self.fail(SessionFailure::Negotiation(stanza.raw().to_string()), true),
            Reply::Unrelated => vec![],
        }
    }

    pub(super) fn handle_roster(&mut self, stanza: &Stanza) -> Vec<SessionAction> {
        match reply_to(stanza, ROSTER_ID) {
            Reply::Result(el) => {
                if let Some(query) = el.child("query") {
                    for item in query.children_named("item") {
                        if let Some(jid) = item.attr("jid") {
                            self.roster.merge_fetched(jid, item.attr("name"));
                        }
                    }
                }
                self.stage = SessionStage::Streaming;
                vec![
                    SessionAction::Send(stanza::initial_presence()),
                    SessionAction::Established {
                        jid: self.jid.clone().unwrap_or_default(),
                    },
                ]
            }
            Reply::Error => self.fail(SessionFailure::Negotiation(stanza.raw().to_string()), true),
            // Contacts may start talking before the roster lands.
            Reply::Unrelated => self.handle_streaming(stanza),
        }
    }

    pub(super) fn handle_streaming(&mut self, stanza: &Stanza) -> Vec<SessionAction> {
        let el = stanza.element();
        match stanza.kind() {
            "presence" => self.classify_presence(el).into_iter().collect(),
            "message" => self.classify_message(el).into_iter().collect(),
            "iq" => self.answer_iq(el),
            _ => vec![],
        }
    }

    fn classify_presence(&mut self, el: &Element) -> Option<SessionAction> {
        let jid = el.attr("from")?.to_string();
        let photo = el
            .children_named("x")
            .find(|x| declares(x, NS_AVATAR_UPDATE))
            .and_then(|x| x.child_text("photo"))
            .map(str::to_string);

        let presence = PresenceEvent {
            jid,
            kind: el.attr("type").map(str::to_string),
            show: el.child_text("show").map(str::to_string),
            status: el.child_text("status").map(str::to_string),
            photo,
        };
        self.roster.apply_presence(&presence);
        Some(SessionAction::Emit(InboundEvent::Presence(presence)))
    }

    fn classify_message(&mut self, el: &Element) -> Option<SessionAction> {
        let from = el.attr("from")?.to_string();
        let otr = el
            .children_named("x")
            .find(|x| declares(x, NS_NOSAVE))
            .map(|x| x.attr("value") == Some("enabled"));
        if let Some(otr) = otr {
            self.roster.set_otr(&from, otr);
        }

        let message = MessageEvent {
            from,
            time: chrono::Utc::now().timestamp_millis(),
            kind: el.attr("type").map(str::to_string),
            body: el.child_text("body").map(str::to_string),
            otr,
        };
        Some(SessionAction::Emit(InboundEvent::Message(message)))
    }

    fn answer_iq(&mut self, el: &Element) -> Vec<SessionAction> {
        let (Some(kind), Some(id)) = (el.attr("type"), el.attr("id")) else {
            return vec![];
        };
        let from = el.attr("from");

        match kind {
            "get" if el.child("ping").is_some_and(|p| declares(p, NS_PING)) => {
                vec![SessionAction::Send(stanza::iq_result(from, id))]
            }
            "set" => {
                let Some(query) = el.child("query").filter(|q| declares(q, NS_ROSTER)) else {
                    return vec![];
                };
                // Only the account's own server may push roster changes.
                if from.is_some_and(|from| from != self.bare_jid()) {
                    return vec![];
                }
                for item in query.children_named("item") {
                    let Some(jid) = item.attr("jid") else { continue };
                    if item.attr("subscription") == Some("remove") {
                        self.roster.remove(jid);
                    } else {
                        self.roster.merge_pushed(jid, item.attr("name"));
                    }
                }
                vec![SessionAction::Send(stanza::iq_result(None, id))]
            }
            _ => vec![],
        }
    }

    fn bare_jid(&self) -> &str {
        jid::bare(self.jid.as_deref().unwrap_or(&self.config.account))
    }
}
