//! Upstream transport establishment.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::SessionError;

/// Any duplex byte stream a session can run over.
pub trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IoStream for T {}

/// Type-erased transport, plaintext or encrypted.
pub type BoxedStream = Box<dyn IoStream>;

/// Opens a fresh transport to the XMPP server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<BoxedStream, SessionError>;
}

/// TCP connector for the configured upstream.
pub struct TcpConnector {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            timeout: config.connect_timeout(),
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<BoxedStream, SessionError> {
        let addr = (self.host.as_str(), self.port);
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                SessionError::Transport(format!(
                    "connect to {}:{} timed out",
                    self.host, self.port
                ))
            })??;
        stream.set_nodelay(true)?;
        debug!(host = %self.host, port = self.port, "Upstream connected");
        Ok(Box::new(stream))
    }
}
