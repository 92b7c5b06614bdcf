use crate::api::{self, CALCULATE_PORTFOLIO_PATH};
use crate::core::PortfolioCalculator;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Serves the calculation endpoint until Ctrl-C.
pub async fn run(calculator: Arc<PortfolioCalculator>, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(
        "Listening on http://{}{}",
        listener.local_addr()?,
        CALCULATE_PORTFOLIO_PATH
    );

    axum::serve(listener, api::router(calculator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
