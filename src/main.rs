//! product-feed-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use product_feed_gateway::app_state::AppState;
use product_feed_gateway::config::GatewayConfig;
use product_feed_gateway::server;

/// How long to wait for queued changes to be fanned out on shutdown.
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env().context("loading configuration")?;
    tracing::info!(
        addr = %config.listen_addr,
        ws_path = %config.ws_path,
        policy = ?config.auth_policy,
        group = %config.broadcast_group,
        "starting product-feed-gateway"
    );

    // Build the broadcast stack
    let (app_state, dispatcher) = AppState::from_config(&config);
    let dispatcher_task = dispatcher.spawn();

    // Build router
    let app = server::build_app(app_state, &config.ws_path);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    server::serve(listener, app, shutdown_signal()).await?;

    // The router owned the publisher clones; the dispatcher drains and exits.
    match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_task).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "dispatcher task failed"),
        Err(_) => tracing::warn!("dispatcher did not drain before shutdown"),
    }
    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
