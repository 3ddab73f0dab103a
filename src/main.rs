//! Flowguard diagnostics server
//!
//! Runs a toolkit instance configured from the environment and exposes its
//! breaker and cache state over HTTP.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowguard::api::{create_router, AppState};
use flowguard::Config;

/// Main entry point for the diagnostics server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the registry and start the cache sweep
/// 4. Serve the diagnostics router on the configured port
/// 5. On SIGINT/SIGTERM stop the sweep and shut down rate limiters
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowguard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Flowguard diagnostics server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_keys={}, default_ttl={}s, failure_threshold={}, port={}",
        config.cache.max_keys,
        config.cache.default_ttl,
        config.breaker.failure_threshold,
        config.server_port
    );

    let state = AppState::from_config(&config);
    info!("Registry and cache initialized");

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then stops background work.
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    state.cache.shutdown();
    state.registry.shutdown();
    warn!("Background tasks stopped");
}
