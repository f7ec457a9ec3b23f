//! cadence-pl - tempo-targeted playlist builder service
//!
//! Serves `POST /build_playlist` plus `/ping` and `/health`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cadence_pl::config::CadenceConfig;
use cadence_pl::services::{PlaylistPipeline, TempoResolver};
use cadence_pl::AppState;

/// Command-line arguments for cadence-pl
#[derive(Parser, Debug)]
#[command(name = "cadence-pl")]
#[command(about = "Tempo-targeted playlist builder")]
#[command(version)]
struct Args {
    /// Path to cadence.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides [server] port)
    #[arg(short, long, env = "CADENCE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    let args = Args::parse();
    let config = CadenceConfig::load(args.config.as_deref()).context("Failed to load config")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("cadence_pl={0},cadence_common={0},tower_http={0}", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cadence-pl (playlist builder)");
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cache = config
        .build_cache()
        .await
        .context("Failed to open tempo cache")?;
    let sources = config
        .build_sources()
        .context("Failed to configure tempo sources")?;
    let catalog = config
        .build_catalog()
        .context("Failed to configure catalog client")?;

    let resolver = Arc::new(TempoResolver::new(cache, sources, config.retry.policy()));
    info!("Tempo sources: {}", resolver.source_names().join(", "));

    let pipeline = Arc::new(PlaylistPipeline::new(catalog, resolver));
    let state = AppState::new(pipeline, config.tuning.clone());
    let app = cadence_pl::build_router(state);

    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
