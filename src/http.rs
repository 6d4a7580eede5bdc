//! HTTP server for Prometheus metrics endpoint.
//!
//! Runs on its own port so scrapers never reach the command API.

use axum::{Router, routing::get};
use std::net::{IpAddr, SocketAddr};

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Router serving `/metrics`.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Run the HTTP server for Prometheus metrics.
///
/// Binds to `ip:port`. Long-running; spawn it in the background.
pub async fn run_metrics_server(ip: IpAddr, port: u16) {
    let addr = SocketAddr::new(ip, port);
    tracing::info!("Prometheus HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, metrics_router()).await {
        tracing::error!("HTTP server error: {}", e);
    }
}
