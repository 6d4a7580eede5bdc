//! Telemetry utilities for push timing and log correlation.

use std::time::Instant;

/// Guard for timing one push POST.
///
/// Records latency when dropped.
pub struct PushTimer {
    mode: &'static str,
    start: Instant,
}

impl PushTimer {
    /// Start timing a POST in the given delivery mode.
    pub fn new(mode: &'static str) -> Self {
        Self {
            mode,
            start: Instant::now(),
        }
    }
}

impl Drop for PushTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_push_latency(self.mode, duration);
    }
}

/// Short, log-safe form of a session token.
///
/// Tokens are bearer credentials; logs only carry a prefix.
pub fn token_tag(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(4)
        .map_or(token.len(), |(i, _)| i);
    &token[..end]
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span covering a session's driver and event pump.
    pub fn session(token: &str, account: &str) -> Span {
        info_span!("session", token = %super::token_tag(token), account = %account)
    }

    /// Span for one gateway request.
    pub fn request(route: &'static str) -> Span {
        info_span!("request", route = route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_tag_truncates() {
        assert_eq!(token_tag("abcdefghijklmnop"), "abcd");
        assert_eq!(token_tag("ab"), "ab");
    }
}
