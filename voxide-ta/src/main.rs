//! voxide-ta - Transcript Analytics coordination service
//!
//! Receives transcript-ready and job-completion events from the
//! notification fabric, routes transcripts through inline or job-based
//! analysis against the text-analytics engine, and reconciles job
//! completions into consolidated analysis artifacts.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voxide_common::events::EventBus;
use voxide_ta::services::{FsObjectStore, HttpTextAnalytics};
use voxide_ta::AppState;

/// Command-line arguments for voxide-ta
#[derive(Parser, Debug)]
#[command(name = "voxide-ta")]
#[command(about = "Transcript Analytics coordination service for Voxide")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "VOXIDE_TA_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides configuration)
    #[arg(short, long, env = "VOXIDE_TA_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = voxide_common::config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting voxide-ta (Transcript Analytics) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let store_root = config.resolved_store_root();
    info!("Object store root: {}", store_root.display());
    let store = Arc::new(
        FsObjectStore::new(&store_root).context("Failed to initialize object store")?,
    );

    let db_path = config.resolved_database_path();
    info!("Database: {}", db_path.display());
    let db_pool = voxide_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    // Surface dispatch records left behind by previous runs
    let cutoff = chrono::Utc::now()
        - chrono::Duration::seconds(config.pipeline.stale_after_secs as i64);
    let stale = voxide_ta::report_stale_job_sets(&db_pool, cutoff).await?;
    if stale > 0 {
        info!("{} stale in-flight job sets reported", stale);
    }

    let analytics = Arc::new(
        HttpTextAnalytics::new(
            &config.analytics.base_url,
            Duration::from_secs(config.analytics.request_timeout_secs),
        )
        .context("Failed to create analytics client")?,
    );
    info!("Analytics endpoint: {}", config.analytics.base_url);

    let event_bus = EventBus::new(1000);

    let port = args.port.unwrap_or(config.port);
    let state = AppState::new(db_pool, event_bus, store, analytics, Arc::new(config));
    let app = voxide_ta::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
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
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
