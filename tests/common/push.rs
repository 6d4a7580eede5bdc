//! Push client that records requests and answers from a script.

use std::collections::VecDeque;

use async_trait::async_trait;
use jabgate::error::DeliveryError;
use jabgate::push::{PushClient, PushRequest, PushResponse};
use parking_lot::Mutex;

pub const OK: PushResponse = PushResponse {
    status: 200,
    suppressed: false,
};

pub const SUPPRESSED: PushResponse = PushResponse {
    status: 200,
    suppressed: true,
};

/// Answers scripted responses in order, then 200.
#[derive(Default)]
pub struct RecordingPush {
    script: Mutex<VecDeque<Result<PushResponse, DeliveryError>>>,
    requests: Mutex<Vec<PushRequest>>,
}

impl RecordingPush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, response: Result<PushResponse, DeliveryError>) -> Self {
        self.script.lock().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<PushRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PushClient for RecordingPush {
    async fn post(&self, request: PushRequest) -> Result<PushResponse, DeliveryError> {
        self.requests.lock().push(request);
        self.script.lock().pop_front().unwrap_or(Ok(OK))
    }
}
