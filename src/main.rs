//! Artifact Gateway
//!
//! Serves checksum-verified static artifacts and relays uploads to a backend
//! that completes them as asynchronous jobs.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use artifact_gateway::config::Config;
use artifact_gateway::routes;
use artifact_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artifact_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config from env: {}", e);
            std::process::exit(2);
        }
    };

    tracing::info!("Starting Artifact Gateway v{}", env!("CARGO_PKG_VERSION"));

    let app_state = AppState::from_config(config).context("failed to initialize state")?;
    let config = app_state.config();

    tracing::info!("Static root: {}", app_state.static_server().root().display());
    tracing::info!("Backend: {}", config.backend.base_url);
    tracing::info!(
        poll_interval = ?config.jobs.poll_interval,
        job_timeout = ?config.jobs.timeout,
        "Job polling configured"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;

    let app = routes::app(app_state.clone());

    tracing::info!("Artifact Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
