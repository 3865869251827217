//! wastecare-api - HTTP surface for Waste Care
//!
//! Backend selection: the hosted backend when service credentials are
//! configured, otherwise the local store at `database_path`, otherwise none
//! (the server starts and backend-dependent endpoints answer 500).

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use wastecare_api::{bind_listener, build_router, AppState};
use wastecare_common::backend::{RemoteBackend, SqliteBackend};
use wastecare_common::config::{load_config, TomlConfig};

#[derive(Parser, Debug)]
#[command(name = "wastecare-api")]
#[command(about = "HTTP API for Waste Care")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "WASTECARE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides [server].port)
    #[arg(short, long, env = "WASTECARE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| loaded.config.logging.level.clone().into()),
        )
        .init();

    info!(
        "Starting Waste Care API (wastecare-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    loaded.log_resolution();
    let config = loaded.config;

    let state = connect_backend(&config).await?;
    let app = build_router(state);

    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, port))?;

    let (listener, bound) = bind_listener(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("wastecare-api listening on http://{}", bound);
    info!("Health check: http://{}/health", bound);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn connect_backend(config: &TomlConfig) -> Result<AppState> {
    match config.backend.require_service_role() {
        Ok(credentials) => {
            let backend = Arc::new(RemoteBackend::with_service_role(&credentials)?);
            info!("✓ Using hosted backend at {}", credentials.url);
            return Ok(AppState::new(Some(backend.clone()), Some(backend)));
        }
        Err(e) => warn!("Hosted backend unavailable: {}", e),
    }

    if let Some(path) = &config.database_path {
        let backend = Arc::new(
            SqliteBackend::connect(path)
                .await
                .with_context(|| format!("Failed to open local store {}", path.display()))?,
        );
        info!("✓ Using local store at {}", path.display());
        return Ok(AppState::new(Some(backend.clone()), Some(backend)));
    }

    warn!("No backend configured; leaderboard endpoints will answer 500");
    Ok(AppState::default())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
