//! Push delivery configuration.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{default_push_timeout, default_user_agent};

/// Settings for the HTTP client that posts notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Seconds to wait for a push endpoint to answer.
    #[serde(default = "default_push_timeout")]
    pub timeout_secs: u64,
    /// User-Agent header sent with every push.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_push_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl PushConfig {
    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
