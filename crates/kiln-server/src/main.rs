//! Kiln server entry point.
//!
//! Wires the process sandbox provider into a session registry and serves
//! the HTTP + WebSocket gateway until ctrl-c, then cancels every live
//! session before exiting.

use kiln_core::{ProcessProvider, SessionRegistry};
use kiln_server::{routes, AppState, ServerConfig};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting kiln server");

    let config = ServerConfig::from_env();
    tracing::info!(?config, "Configuration loaded");
    config.validate_warn();

    let provider = ProcessProvider::new(config.runtime_config());
    let registry = SessionRegistry::new(provider, config.core_config());
    let state = AppState {
        registry: registry.clone(),
    };

    routes::serve(state, config.http_addr, shutdown_signal()).await?;

    // Tear down everything still running before the process exits.
    registry.shutdown_all().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Received shutdown signal, cleaning up...");
}
