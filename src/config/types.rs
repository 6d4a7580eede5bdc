//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use super::defaults::{default_listen_address, default_metrics_port};
use super::push::PushConfig;
use super::store::StoreConfig;
use super::upstream::UpstreamConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Gateway configuration.
///
/// Every section has defaults, so an empty file yields a working local setup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP API listener.
    #[serde(default)]
    pub listen: ListenConfig,
    /// XMPP server the sessions connect to.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Session descriptor and message queue storage.
    #[serde(default)]
    pub store: StoreConfig,
    /// Outbound push delivery.
    #[serde(default)]
    pub push: PushConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// HTTP API listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address the command API binds to (e.g., "127.0.0.1:8080").
    #[serde(default = "default_listen_address")]
    pub address: SocketAddr,
    /// Port for the Prometheus endpoint. 0 disables it.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_listen_address(),
            metrics_port: default_metrics_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use std::time::Duration;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.listen.address.port(), 8080);
        assert_eq!(config.upstream.host, "talk.google.com");
        assert_eq!(config.upstream.port, 5222);
        assert_eq!(config.upstream.handshake_timeout(), Duration::from_secs(30));
        assert_eq!(config.store.backend, StoreBackend::Redb);
        assert_eq!(config.push.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [listen]
            address = "0.0.0.0:9000"
            metrics_port = 0

            [upstream]
            host = "xmpp.example.net"
            resource = "phone"
            tls_server_name = "example.net"

            [store]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen.address.port(), 9000);
        assert_eq!(config.listen.metrics_port, 0);
        assert_eq!(config.upstream.host, "xmpp.example.net");
        assert_eq!(config.upstream.port, 5222);
        assert_eq!(config.upstream.resource, "phone");
        assert_eq!(config.upstream.tls_server_name.as_deref(), Some("example.net"));
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.path, "jabgate.db");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[push]\nuser_agent = \"test-agent\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.push.user_agent, "test-agent");
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let parsed: Result<Config, _> = toml::from_str("[store]\nbackend = \"sqlite\"\n");
        assert!(parsed.is_err());
    }
}
