//! Production push client over reqwest.

use async_trait::async_trait;

use super::{
    HEADER_CONTENT_LENGTH, HEADER_NOTIFICATION_STATUS, PushClient, PushRequest, PushResponse,
    STATUS_SUPPRESSED,
};
use crate::config::PushConfig;
use crate::error::DeliveryError;

/// Push client backed by a pooled `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestPushClient {
    http: reqwest::Client,
}

impl ReqwestPushClient {
    pub fn new(config: &PushConfig) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PushClient for ReqwestPushClient {
    async fn post(&self, request: PushRequest) -> Result<PushResponse, DeliveryError> {
        let mut builder = self.http.post(&request.url);
        for (name, value) in &request.headers {
            // reqwest sets the length from the body.
            if name.eq_ignore_ascii_case(HEADER_CONTENT_LENGTH) {
                continue;
            }
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.body(request.body).send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Timeout
            } else {
                DeliveryError::Request(e)
            }
        })?;

        let suppressed = response
            .headers()
            .get(HEADER_NOTIFICATION_STATUS)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case(STATUS_SUPPRESSED));

        Ok(PushResponse {
            status: response.status().as_u16(),
            suppressed,
        })
    }
}
