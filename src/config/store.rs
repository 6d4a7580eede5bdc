//! Session store configuration.

use serde::Deserialize;

use super::defaults::default_store_path;

/// Which store keeps session descriptors and queued messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Embedded redb file; survives restarts.
    #[default]
    Redb,
    /// Process memory; everything is lost on exit.
    Memory,
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Backend type: "redb" or "memory".
    #[serde(default)]
    pub backend: StoreBackend,
    /// Path to the redb file.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}
