//! Builders for the outbound fragments a client stream sends.
//!
//! Every function returns the exact text to write to the transport.
//! Caller-supplied values are escaped here; callers pass plain strings.

use crate::auth::{encode_token, TOKEN_MECHANISM};
use crate::escape::escape;

/// Namespace of the STARTTLS negotiation elements.
pub const NS_TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";
/// Namespace of the SASL negotiation elements.
pub const NS_SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";
/// Namespace of the resource-binding request.
pub const NS_BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";
/// Namespace of the session-establishment request.
pub const NS_SESSION: &str = "urn:ietf:params:xml:ns:xmpp-session";
/// Namespace of roster queries.
pub const NS_ROSTER: &str = "jabber:iq:roster";
/// Namespace of the provider's off-the-record marker.
pub const NS_NOSAVE: &str = "google:nosave";
/// Namespace of the archiving preference marker.
pub const NS_ARCHIVE: &str = "http://jabber.org/protocol/archive";

/// Stanza id of the resource-bind request.
pub const BIND_ID: &str = "bind_resource";
/// Stanza id of the session request.
pub const SESSION_ID: &str = "session";
/// Stanza id of the roster request.
pub const ROSTER_ID: &str = "roster";

/// Opening stream header addressed to `domain`.
///
/// Sent on connect and again after every stream restart (TLS, auth).
pub fn stream_header(domain: &str) -> String {
    format!(
        "<?xml version='1.0'?>\n<stream:stream to='{}' xmlns='jabber:client' \
         xmlns:stream='http://etherx.jabber.org/streams' version='1.0'>",
        escape(domain)
    )
}

/// Close of our half of the stream.
pub fn stream_close() -> String {
    "</stream:stream>".to_string()
}

/// Request to upgrade the transport to TLS.
pub fn starttls() -> String {
    format!("<starttls xmlns='{NS_TLS}'/>")
}

/// Token-mechanism authentication request.
pub fn auth(account: &str, secret: &str) -> String {
    format!(
        "<auth xmlns='{NS_SASL}' mechanism='{TOKEN_MECHANISM}'>{}</auth>",
        encode_token(account, secret)
    )
}

/// Resource-bind request.
pub fn bind(resource: &str) -> String {
    format!(
        "<iq type='set' id='{BIND_ID}'><bind xmlns='{NS_BIND}'><resource>{}</resource></bind></iq>",
        escape(resource)
    )
}

/// Session-establishment request addressed to the account's server.
pub fn session(server: &str) -> String {
    format!(
        "<iq to='{}' type='set' id='{SESSION_ID}'><session xmlns='{NS_SESSION}'/></iq>",
        escape(server)
    )
}

/// Roster fetch on behalf of the bound identifier.
pub fn roster_get(jid: &str) -> String {
    format!(
        "<iq from='{}' type='get' id='{ROSTER_ID}'><query xmlns='{NS_ROSTER}'/></iq>",
        escape(jid)
    )
}

/// Initial availability broadcast.
pub fn initial_presence() -> String {
    "<presence/>".to_string()
}

/// Empty result acknowledging an iq. Without `to` it goes to the server.
pub fn iq_result(to: Option<&str>, id: &str) -> String {
    match to {
        Some(to) => format!("<iq to='{}' id='{}' type='result'/>", escape(to), escape(id)),
        None => format!("<iq id='{}' type='result'/>", escape(id)),
    }
}

/// Chat message tagged with the conversation's off-the-record state.
pub fn message(from: &str, to: &str, body: &str, otr: bool) -> String {
    let nosave = if otr { "enabled" } else { "disabled" };
    format!(
        "<message from='{}' to='{}'><body>{}</body>\
         <nos:x value='{nosave}' xmlns:nos='{NS_NOSAVE}'/>\
         <arc:record otr='{otr}' xmlns:arc='{NS_ARCHIVE}'/></message>",
        escape(from),
        escape(to),
        escape(body),
    )
}
