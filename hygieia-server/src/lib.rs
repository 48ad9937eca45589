//! HTTP transport for Hygieia: configuration, logging, and routes.

/// Command-line and environment configuration.
pub mod config;
/// Error envelope returned by handlers.
pub mod error;
/// Route table and handlers.
pub mod routes;
/// Tracing subscriber setup.
pub mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;

use hygieia_core::service::HygieiaService;

pub use config::Config;
pub use error::ApiError;
pub use routes::router;

/// Serve the facade on `addr` until Ctrl-C.
///
/// # Errors
///
/// Fails when the address cannot be bound or the server stops with an I/O error.
pub async fn serve(service: Arc<HygieiaService>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
