//! Prometheus metrics for jabgate.
//!
//! - `jabgate_sessions_active` - sessions currently streaming
//! - `jabgate_events_total{kind}` - inbound events by kind
//! - `jabgate_deliveries_total{outcome}` - message dispatch outcomes
//! - `jabgate_push_duration_seconds{mode}` - push POST latency
//! - `jabgate_handshake_failures_total{reason}` - failed logins and restores

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Sessions that reached steady state and have not ended.
pub static ACTIVE_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

/// Inbound events by kind (message, presence, auth_failure).
pub static EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Dispatch outcomes for message events.
pub static DELIVERIES: OnceLock<IntCounterVec> = OnceLock::new();

/// Push POST latency by delivery mode.
pub static PUSH_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Handshakes that never reached steady state, by failure reason.
pub static HANDSHAKE_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(metric = stringify!($metric), error = %e, "Failed to register metric");
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(metric = stringify!($metric), error = %e, "Failed to create metric");
                }
            }
        };
    }

    register!(ACTIVE_SESSIONS, IntGauge::new("jabgate_sessions_active", "Sessions in steady state"));
    register!(EVENTS, IntCounterVec::new(Opts::new("jabgate_events_total", "Inbound events by kind"), &["kind"]));
    register!(DELIVERIES, IntCounterVec::new(Opts::new("jabgate_deliveries_total", "Message dispatch outcomes"), &["outcome"]));
    register!(PUSH_LATENCY, HistogramVec::new(
        HistogramOpts::new("jabgate_push_duration_seconds", "Push POST latency by delivery mode")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["mode"]));
    register!(HANDSHAKE_FAILURES, IntCounterVec::new(Opts::new("jabgate_handshake_failures_total", "Handshake failures by reason"), &["reason"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

fn get_counter_vec(metric: &OnceLock<IntCounterVec>) -> Option<&IntCounterVec> {
    metric.get()
}

#[inline]
pub fn session_started() {
    if let Some(g) = ACTIVE_SESSIONS.get() {
        g.inc();
    }
}

#[inline]
pub fn session_ended() {
    if let Some(g) = ACTIVE_SESSIONS.get() {
        g.dec();
    }
}

/// Record one inbound event.
#[inline]
pub fn record_event(kind: &str) {
    if let Some(c) = get_counter_vec(&EVENTS) {
        c.with_label_values(&[kind]).inc();
    }
}

/// Record the outcome of dispatching one message event.
#[inline]
pub fn record_delivery(outcome: &str) {
    if let Some(c) = get_counter_vec(&DELIVERIES) {
        c.with_label_values(&[outcome]).inc();
    }
}

/// Record how long a push POST took.
#[inline]
pub fn record_push_latency(mode: &str, duration_secs: f64) {
    if let Some(h) = PUSH_LATENCY.get() {
        h.with_label_values(&[mode]).observe(duration_secs);
    }
}

/// Record a handshake that did not reach steady state.
#[inline]
pub fn record_handshake_failure(reason: &str) {
    if let Some(c) = get_counter_vec(&HANDSHAKE_FAILURES) {
        c.with_label_values(&[reason]).inc();
    }
}
