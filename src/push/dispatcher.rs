//! Per-event delivery decisions.
//!
//! | endpoint | mode       | action                                        |
//! |----------|------------|-----------------------------------------------|
//! | none     | any        | append to the account's queue                 |
//! | set      | raw        | POST the event as JSON                        |
//! | set      | summarized | queue the event, POST a toast naming the sender |
//!
//! A failed POST clears the endpoint so later events fall back to the queue.
//! A raw POST the platform suppressed switches the session to summarized
//! mode and re-delivers that one event as a toast.

use std::sync::Arc;

use jabgate_proto::MessageEvent;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DisplayNames, PushClient, PushRequest, PushResponse, is_valid_endpoint, toast};
use crate::error::{DeliveryError, SessionError};
use crate::store::{DeliveryMode, SessionStore, SharedDescriptor};
use crate::telemetry::PushTimer;

/// Result of dispatching one message event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Appended to the queue, no endpoint registered.
    Queued,
    /// Raw POST accepted.
    Delivered,
    /// Toast POST accepted.
    Summarized,
    /// The POST failed and the endpoint was cleared.
    EndpointDisabled,
    /// Nothing to deliver.
    Skipped,
}

impl DeliveryOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryOutcome::Queued => "queued",
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Summarized => "summarized",
            DeliveryOutcome::EndpointDisabled => "endpoint_disabled",
            DeliveryOutcome::Skipped => "skipped",
        }
    }
}

/// Routes message events to the queue or the registered endpoint.
pub struct NotificationDispatcher {
    client: Arc<dyn PushClient>,
    store: Arc<dyn SessionStore>,
}

impl NotificationDispatcher {
    pub fn new(client: Arc<dyn PushClient>, store: Arc<dyn SessionStore>) -> Self {
        Self { client, store }
    }

    /// Deliver one message event for the session owning `descriptor`.
    ///
    /// Never fails: delivery problems degrade the endpoint, never the session.
    /// Once `cancel` fires the descriptor is no longer written back.
    pub async fn dispatch(
        &self,
        descriptor: &SharedDescriptor,
        event: &MessageEvent,
        names: &dyn DisplayNames,
        cancel: &CancellationToken,
    ) -> DeliveryOutcome {
        let (account, endpoint, mode) = {
            let d = descriptor.lock();
            (d.account.clone(), d.endpoint.clone(), d.delivery)
        };

        let Some(url) = endpoint else {
            self.enqueue(&account, event).await;
            return DeliveryOutcome::Queued;
        };

        match mode {
            DeliveryMode::Raw => self.deliver_raw(descriptor, &url, event, names, cancel).await,
            DeliveryMode::Summarized => {
                self.deliver_summarized(descriptor, &url, event, names, cancel)
                    .await
            }
        }
    }

    /// Validate and register a push endpoint, resetting delivery to raw.
    ///
    /// A session whose stream is closing is not written back.
    pub async fn register_endpoint(
        &self,
        descriptor: &SharedDescriptor,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        if !is_valid_endpoint(url) {
            return Err(SessionError::InvalidEndpoint(url.to_string()));
        }
        if cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }
        let snapshot = {
            let mut d = descriptor.lock();
            d.endpoint = Some(url.to_string());
            d.delivery = DeliveryMode::Raw;
            d.clone()
        };
        self.store.save(&snapshot).await?;
        info!(endpoint = %url, "Push endpoint registered");
        Ok(())
    }

    async fn deliver_raw(
        &self,
        descriptor: &SharedDescriptor,
        url: &str,
        event: &MessageEvent,
        names: &dyn DisplayNames,
        cancel: &CancellationToken,
    ) -> DeliveryOutcome {
        let body = match serde_json::to_string(event) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to serialize message event");
                return DeliveryOutcome::Skipped;
            }
        };

        match self.post(PushRequest::raw(url, body), DeliveryMode::Raw).await {
            Ok(response) if response.is_success() && response.suppressed => {
                info!("Raw push suppressed, switching to summarized delivery");
                {
                    let mut d = descriptor.lock();
                    d.delivery = DeliveryMode::Summarized;
                }
                self.persist(descriptor, cancel).await;
                self.deliver_summarized(descriptor, url, event, names, cancel)
                    .await
            }
            Ok(response) if response.is_success() => DeliveryOutcome::Delivered,
            Ok(response) => {
                warn!(status = response.status, "Push endpoint rejected raw delivery");
                self.disable(descriptor, url, cancel).await
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Raw push failed");
                self.disable(descriptor, url, cancel).await
            }
        }
    }

    async fn deliver_summarized(
        &self,
        descriptor: &SharedDescriptor,
        url: &str,
        event: &MessageEvent,
        names: &dyn DisplayNames,
        cancel: &CancellationToken,
    ) -> DeliveryOutcome {
        let Some(body) = event.body.as_deref() else {
            debug!(from = %event.from, "No body to summarize");
            return DeliveryOutcome::Skipped;
        };

        let account = descriptor.lock().account.clone();
        self.enqueue(&account, event).await;

        let title = names.display_name(&event.from).await;
        let request = PushRequest::toast(url, toast::render(&title, body));
        match self.post(request, DeliveryMode::Summarized).await {
            Ok(response) if response.is_success() => DeliveryOutcome::Summarized,
            Ok(response) => {
                warn!(status = response.status, "Push endpoint rejected toast delivery");
                self.disable(descriptor, url, cancel).await
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Toast push failed");
                self.disable(descriptor, url, cancel).await
            }
        }
    }

    async fn post(
        &self,
        request: PushRequest,
        mode: DeliveryMode,
    ) -> Result<PushResponse, DeliveryError> {
        let _timer = PushTimer::new(mode.as_str());
        self.client.post(request).await
    }

    /// Clear the endpoint that just failed. A different endpoint registered
    /// meanwhile is left alone.
    async fn disable(
        &self,
        descriptor: &SharedDescriptor,
        url: &str,
        cancel: &CancellationToken,
    ) -> DeliveryOutcome {
        let cleared = {
            let mut d = descriptor.lock();
            if d.endpoint.as_deref() == Some(url) {
                d.endpoint = None;
                true
            } else {
                false
            }
        };
        if cleared {
            info!(endpoint = %url, "Push endpoint disabled, queueing resumed");
            self.persist(descriptor, cancel).await;
        }
        DeliveryOutcome::EndpointDisabled
    }

    async fn persist(&self, descriptor: &SharedDescriptor, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        let snapshot = descriptor.lock().clone();
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "Failed to persist session descriptor");
        }
    }

    async fn enqueue(&self, account: &str, event: &MessageEvent) {
        if let Err(e) = self.store.enqueue(account, event).await {
            warn!(error = %e, "Failed to queue message event");
        }
    }
}
