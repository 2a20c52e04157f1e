//! HTTP surface.
//!
//! Endpoints:
//! - `GET /health`
//! - `POST /chips/import`, `POST /chips/bulk`
//! - `GET /chips`, `GET /chips/{id}`, `DELETE /chips/{id}`
//!
//! On shutdown the server stops accepting connections, drains in-flight
//! requests, then closes the database session.

mod error;
mod routes;

use std::net::SocketAddr;

use axum::Router;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::ApiError;

use crate::initialization::AppContext;

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind HTTP server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the application router over `ctx`.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::import::router())
        .merge(routes::chips::router())
        .with_state(ctx)
}

/// Serves until `shutdown` is cancelled, then releases the database session.
pub async fn serve(
    ctx: AppContext,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!("HTTP server listening on http://{addr}/");

    let manager = ctx.manager.clone();
    let result = axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await;

    manager.shutdown().await;
    info!("HTTP server stopped");
    result.map_err(ServerError::from)
}

/// Cancels `token` on Ctrl+C or SIGTERM.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = token.cancelled() => return,
    }
    token.cancel();
}
