//! Events a streaming session reports to its owner.

/// Everything a session emits after (or instead of) reaching steady state.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum InboundEvent {
    /// A chat message from a contact.
    Message(MessageEvent),
    /// A presence change from a contact.
    Presence(PresenceEvent),
    /// The handshake could not complete.
    AuthFailure {
        /// Raw failure payload or a transport diagnostic.
        details: String,
    },
}

impl InboundEvent {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Message(_) => "message",
            InboundEvent::Presence(_) => "presence",
            InboundEvent::AuthFailure { .. } => "auth_failure",
        }
    }
}

/// A received chat message.
///
/// Serializes to the flat JSON object pushed to raw endpoints and kept in
/// the per-account queue.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageEvent {
    /// Full identifier of the sender.
    pub from: String,
    /// Receive time, milliseconds since the Unix epoch.
    pub time: i64,
    /// Message type attribute (`chat`, `normal`, ...).
    #[cfg_attr(
        feature = "serde",
        serde(rename = "type", default, skip_serializing_if = "Option::is_none")
    )]
    pub kind: Option<String>,
    /// Message text. Typing notifications carry none.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub body: Option<String>,
    /// Off-the-record marker, when the message carried one.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub otr: Option<bool>,
}

/// A received presence update, already reduced to the fields the roster keeps.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PresenceEvent {
    /// Identifier the presence came from, as sent.
    pub jid: String,
    /// Presence type; `None` means available.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "type", default, skip_serializing_if = "Option::is_none")
    )]
    pub kind: Option<String>,
    /// Availability detail (`away`, `dnd`, ...).
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub show: Option<String>,
    /// Free-form status text.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub status: Option<String>,
    /// Avatar hash from the vCard update extension.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub photo: Option<String>,
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_flat_without_absent_fields() {
        let event = MessageEvent {
            from: "b@example.com/res".into(),
            time: 1_700_000_000_000,
            kind: None,
            body: Some("hi".into()),
            otr: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"from": "b@example.com/res", "time": 1_700_000_000_000i64, "body": "hi"})
        );
    }

    #[test]
    fn test_inbound_event_is_tagged() {
        let event = InboundEvent::AuthFailure {
            details: "<failure/>".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "auth_failure");
        assert_eq!(json["details"], "<failure/>");
    }
}
