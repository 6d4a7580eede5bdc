//! STARTTLS upgrade of an established upstream transport.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::{debug, warn};

use super::connector::BoxedStream;
use crate::error::SessionError;

/// An upgraded transport and whether the peer's certificate checked out.
pub struct Upgraded {
    pub stream: BoxedStream,
    pub verified: bool,
}

/// Wraps a plaintext transport in TLS.
#[async_trait]
pub trait TlsUpgrader: Send + Sync {
    /// Run the TLS handshake, verifying the peer as `server_name`.
    async fn upgrade(&self, stream: BoxedStream, server_name: &str)
    -> Result<Upgraded, SessionError>;
}

/// Rustls upgrader trusting the platform's root certificates.
pub struct RustlsUpgrader {
    connector: TlsConnector,
}

impl RustlsUpgrader {
    pub fn new() -> Self {
        let mut roots = RootCertStore::empty();
        let certs = rustls_native_certs::load_native_certs();
        for cert in certs.certs {
            if let Err(e) = roots.add(cert) {
                warn!("Failed to add root cert: {}", e);
            }
        }
        for e in &certs.errors {
            warn!("Error loading native certs: {}", e);
        }
        debug!(roots = roots.len(), "Loaded TLS trust anchors");

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            connector: TlsConnector::from(Arc::new(config)),
        }
    }
}

impl Default for RustlsUpgrader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TlsUpgrader for RustlsUpgrader {
    async fn upgrade(
        &self,
        stream: BoxedStream,
        server_name: &str,
    ) -> Result<Upgraded, SessionError> {
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|e| SessionError::Verification(format!("{server_name}: {e}")))?;
        // Rustls refuses unverifiable peers during the handshake itself.
        let tls = self
            .connector
            .connect(name, stream)
            .await
            .map_err(|e| SessionError::Verification(e.to_string()))?;
        Ok(Upgraded {
            stream: Box::new(tls),
            verified: true,
        })
    }
}
