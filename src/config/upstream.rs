//! Upstream XMPP server configuration.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{
    default_connect_timeout, default_handshake_timeout, default_resource, default_upstream_host,
    default_upstream_port,
};

/// Where sessions connect and how long the handshake may take.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Server host name.
    #[serde(default = "default_upstream_host")]
    pub host: String,
    /// Client-to-server port.
    #[serde(default = "default_upstream_port")]
    pub port: u16,
    /// Resource requested at bind time.
    #[serde(default = "default_resource")]
    pub resource: String,
    /// Name the server certificate is verified against.
    /// Defaults to the account's domain.
    #[serde(default)]
    pub tls_server_name: Option<String>,
    /// Seconds allowed for the TCP connect.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Seconds allowed from connect until the session is streaming.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: default_upstream_host(),
            port: default_upstream_port(),
            resource: default_resource(),
            tls_server_name: None,
            connect_timeout_secs: default_connect_timeout(),
            handshake_timeout_secs: default_handshake_timeout(),
        }
    }
}

impl UpstreamConfig {
    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Handshake timeout as a `Duration`.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}
