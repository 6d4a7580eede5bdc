//! HTTP command surface.
//!
//! | route           | form fields          | answer                         |
//! |-----------------|----------------------|--------------------------------|
//! | `/login`        | `username`, `auth`   | session token, or 401          |
//! | `/message`      | `token`, `to`, `body`| empty                          |
//! | `/roster`       | `token`              | one roster entry per line      |
//! | `/messagequeue` | `token`              | one queued message per line    |
//! | `/logout`       | `token`              | empty                          |
//! | `/register`     | `token`, `url`       | empty, or 400 on a bad URL     |

mod handlers;

pub use handlers::ApiError;

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::routing::post;
use tokio::net::TcpListener;

use crate::registry::SessionRegistry;

/// Build the command router over a registry.
pub fn router(registry: SessionRegistry) -> Router {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/message", post(handlers::message))
        .route("/roster", post(handlers::roster))
        .route("/messagequeue", post(handlers::message_queue))
        .route("/logout", post(handlers::logout))
        .route("/register", post(handlers::register))
        .fallback(handlers::not_found)
        .with_state(registry)
}

/// Serve the command API until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    registry: SessionRegistry,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    if let Some(addr) = addr {
        tracing::info!("Command API listening on {}", addr);
    }
    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown)
        .await
}
