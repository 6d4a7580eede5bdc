//! Push delivery of message events to a client's registered endpoint.
//!
//! The [`NotificationDispatcher`] decides per event whether to queue it,
//! POST it as JSON, or POST a toast summary. The HTTP side sits behind
//! [`PushClient`] so tests can script endpoint behavior.

mod client;
mod dispatcher;
mod endpoint;
mod toast;

pub use client::ReqwestPushClient;
pub use dispatcher::{DeliveryOutcome, NotificationDispatcher};
pub use endpoint::is_valid_endpoint;

use async_trait::async_trait;

use crate::error::DeliveryError;

pub const HEADER_NOTIFICATION_CLASS: &str = "X-NotificationClass";
pub const HEADER_TARGET: &str = "X-WindowsPhone-Target";
pub const HEADER_NOTIFICATION_STATUS: &str = "X-NotificationStatus";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";

/// Notification status reported when the platform refused to show a raw push.
pub const STATUS_SUPPRESSED: &str = "Suppressed";

/// Notification class of raw pushes.
pub const CLASS_RAW: &str = "3";
/// Notification class of toast pushes.
pub const CLASS_TOAST: &str = "2";

/// One outbound POST.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushRequest {
    pub url: String,
    pub body: String,
    pub headers: Vec<(&'static str, String)>,
}

impl PushRequest {
    /// Raw push carrying a serialized event.
    pub fn raw(url: impl Into<String>, body: String) -> Self {
        let headers = vec![
            (HEADER_NOTIFICATION_CLASS, CLASS_RAW.to_string()),
            (HEADER_CONTENT_TYPE, "text/json".to_string()),
            (HEADER_CONTENT_LENGTH, body.len().to_string()),
        ];
        Self {
            url: url.into(),
            body,
            headers,
        }
    }

    /// Toast push carrying a rendered notification document.
    pub fn toast(url: impl Into<String>, body: String) -> Self {
        let headers = vec![
            (HEADER_NOTIFICATION_CLASS, CLASS_TOAST.to_string()),
            (HEADER_TARGET, "toast".to_string()),
            (HEADER_CONTENT_TYPE, "text/xml".to_string()),
            (HEADER_CONTENT_LENGTH, body.len().to_string()),
        ];
        Self {
            url: url.into(),
            body,
            headers,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the endpoint answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushResponse {
    pub status: u16,
    /// The platform accepted the request but will not show it.
    pub suppressed: bool,
}

impl PushResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport for push POSTs.
#[async_trait]
pub trait PushClient: Send + Sync {
    async fn post(&self, request: PushRequest) -> Result<PushResponse, DeliveryError>;
}

/// Source of sender display names for summarized pushes.
#[async_trait]
pub trait DisplayNames: Send + Sync {
    /// Roster name for `jid` when known, otherwise its bare form.
    async fn display_name(&self, jid: &str) -> String;
}
