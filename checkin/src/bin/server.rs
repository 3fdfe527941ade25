//! Check-in HTTP server.
//!
//! This binary:
//! - Loads configuration from the environment (and `.env`)
//! - Connects the participant store (in-memory or `PostgreSQL`)
//! - Installs the Prometheus recorder and serves `/metrics` on its own port
//! - Serves the check-in and roster API until Ctrl+C / SIGTERM
//!
//! # Usage
//!
//! ```bash
//! # In-memory store seeded from a file
//! SEED_FILE=checkin/seed/participants.json cargo run --bin server
//!
//! # PostgreSQL
//! STORAGE_BACKEND=postgres DATABASE_URL=postgres://... cargo run --bin server
//! ```

use anyhow::Context;
use checkin::bootstrap::Resources;
use checkin::config::Config;
use checkin::metrics::register_checkin_metrics;
use checkin::server::{AppState, build_router, metrics_router};
use gatecheck_runtime::metrics::MetricsServer;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,checkin=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting check-in server");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        backend = ?config.storage.backend,
        bind = %config.bind_address(),
        store_timeout_ms = config.checkin.store_timeout_ms,
        "Configuration loaded"
    );

    if config.server.metrics_enabled {
        start_metrics(&config).await?;
    }

    let resources = Resources::from_config(&config)
        .await
        .context("Failed to prepare participant store")?;
    info!(backend = resources.store.backend(), "Participant store ready");

    let app = build_router(AppState::new(resources.service.clone()));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .into_future(),
    );

    shutdown_signal().await;
    let _ = stop_tx.send(());

    let grace = Duration::from_secs(config.server.shutdown_timeout);
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined
            .context("HTTP server task panicked")?
            .context("HTTP server failed")?,
        Err(_) => warn!(?grace, "Open connections did not drain in time"),
    }

    info!("Server stopped");
    Ok(())
}

/// Install the recorder and serve `/metrics` on the metrics address.
async fn start_metrics(config: &Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .metrics_address()
        .parse()
        .with_context(|| format!("Invalid metrics address {}", config.metrics_address()))?;

    let mut metrics = MetricsServer::new(addr);
    metrics.start().context("Failed to start metrics exporter")?;
    metrics.describe(register_checkin_metrics);

    let Some(handle) = metrics.handle().cloned() else {
        warn!("Metrics recorder owned elsewhere; /metrics not served");
        return Ok(());
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics listener {addr}"))?;
    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, metrics_router(handle)).await {
            warn!(%error, "Metrics server stopped");
        }
    });

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => {
                warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
