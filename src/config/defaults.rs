//! Default value functions for configuration.

use std::net::SocketAddr;

// =============================================================================
// Listener Defaults
// =============================================================================

pub fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

pub fn default_metrics_port() -> u16 {
    9090
}

// =============================================================================
// Upstream Defaults
// =============================================================================

pub fn default_upstream_host() -> String {
    "talk.google.com".to_string()
}

pub fn default_upstream_port() -> u16 {
    5222
}

pub fn default_resource() -> String {
    jabgate_proto::session::DEFAULT_RESOURCE.to_string()
}

pub fn default_connect_timeout() -> u64 {
    15
}

pub fn default_handshake_timeout() -> u64 {
    30
}

// =============================================================================
// Store Defaults
// =============================================================================

pub fn default_store_path() -> String {
    "jabgate.db".to_string()
}

// =============================================================================
// Push Defaults
// =============================================================================

pub fn default_push_timeout() -> u64 {
    10
}

pub fn default_user_agent() -> String {
    concat!("jabgate/", env!("CARGO_PKG_VERSION")).to_string()
}
