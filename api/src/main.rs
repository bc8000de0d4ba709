use anyhow::{Context, Result};
use std::net::SocketAddr;

use api::routes;
use api::state::AppState;
use common::bootstrap::init_services;
use common::config::Settings;
use common::telemetry::{init_logging, init_metrics};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Settings::load().context("Failed to load configuration")?;

    // Initialize tracing
    init_logging(&config.observability)?;
    tracing::info!("Starting wiki API server");

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        mock = config.auth.use_mock,
        "Configuration loaded"
    );

    // Initialize Prometheus metrics exporter
    let metrics_handle = init_metrics()?;
    tracing::info!("Metrics exporter initialized");

    let services = init_services(&config).await?;
    let db_pool = services.db_pool.clone();

    // Create application state
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    let state = AppState::new(config, services, Some(metrics_handle));

    // Create router
    let app = routes::create_router(state);

    // Start server
    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db_pool) = db_pool {
        db_pool.close().await;
    }

    tracing::info!("API server stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}
