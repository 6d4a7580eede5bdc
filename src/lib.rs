//! jabgate - persistent XMPP sessions with push delivery.
//!
//! A client logs in once through the HTTP command API. The gateway keeps the
//! XMPP session open on its behalf, survives restarts by re-authenticating
//! from stored descriptors, and hands every incoming message either to the
//! client's push endpoint or to a per-account queue the client drains later.

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod push;
pub mod registry;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod token;

pub use registry::SessionRegistry;
