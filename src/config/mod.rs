//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level config struct, API listener and loading
//! - [`upstream`]: XMPP server connection and handshake settings
//! - [`store`]: Session store backend selection
//! - [`push`]: Push delivery client settings
//! - [`validation`]: Startup sanity checks

mod defaults;
mod push;
mod store;
mod types;
mod upstream;
pub mod validation;

pub use push::PushConfig;
pub use store::{StoreBackend, StoreConfig};
pub use types::{Config, ConfigError, ListenConfig};
pub use upstream::UpstreamConfig;
