//! jabgated - XMPP push gateway daemon.

use std::sync::Arc;

use jabgate::config::{Config, StoreBackend, validation};
use jabgate::push::ReqwestPushClient;
use jabgate::session::{RustlsUpgrader, SessionSettings, TcpConnector};
use jabgate::store::{MemoryStore, RedbStore, SessionStore};
use jabgate::{SessionRegistry, api, http, metrics};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        ));
    }

    info!(
        listen = %config.listen.address,
        upstream = %format!("{}:{}", config.upstream.host, config.upstream.port),
        "Starting jabgated"
    );

    metrics::init();

    let store: Arc<dyn SessionStore> = match config.store.backend {
        StoreBackend::Redb => Arc::new(RedbStore::open(&config.store.path)?),
        StoreBackend::Memory => {
            warn!("Using in-memory store; sessions will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let push = Arc::new(ReqwestPushClient::new(&config.push)?);
    let registry = SessionRegistry::new(
        store,
        push,
        Arc::new(TcpConnector::new(&config.upstream)),
        Arc::new(RustlsUpgrader::new()),
        SessionSettings::from(&config.upstream),
    );

    if config.listen.metrics_port != 0 {
        tokio::spawn(http::run_metrics_server(
            config.listen.address.ip(),
            config.listen.metrics_port,
        ));
    }

    // Restore in the background so the API is reachable right away.
    {
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = registry.restore_all().await {
                error!(error = %e, "Failed to load persisted sessions");
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(config.listen.address).await?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    };
    api::serve(listener, registry.clone(), shutdown).await?;

    registry.close_all();
    info!("jabgated stopped");
    Ok(())
}
