//! Session runtime: one driver task per XMPP account.
//!
//! - [`connector`]: opens the upstream transport
//! - [`tls`]: STARTTLS upgrade collaborator
//! - [`engine`]: the driver task around the protocol state machine
//! - [`handle`]: what the gateway holds on to

pub mod connector;
pub mod engine;
pub mod handle;
pub mod tls;

pub use connector::{BoxedStream, Connector, IoStream, TcpConnector};
pub use engine::{SessionCommand, SessionEngine, SessionOrigin, SessionSettings, Spawned};
pub use handle::SessionHandle;
pub use tls::{RustlsUpgrader, TlsUpgrader, Upgraded};
