//! Kiosk jukebox session controller - main entry point
//!
//! Wires the catalog, the media engine, the single-writer session
//! controller, and the REST/SSE surface together and serves until a
//! shutdown signal arrives.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jukebox_common::config;
use jukebox_common::events::EventBus;
use jukebox_session::api;
use jukebox_session::catalog::Catalog;
use jukebox_session::engine::sim::SimulatedEngine;
use jukebox_session::session::SessionController;
use jukebox_session::state::SharedState;

/// Command-line arguments for jukebox-session
#[derive(Parser, Debug)]
#[command(name = "jukebox-session")]
#[command(about = "Session controller for the kiosk video jukebox")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5750", env = "JUKEBOX_PORT")]
    port: u16,

    /// Settings file (falls back to JUKEBOX_CONFIG, then the platform
    /// config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Library root; overrides the settings file
    #[arg(short, long, env = "JUKEBOX_LIBRARY")]
    library: Option<PathBuf>,

    /// Simulated track length in seconds for the built-in engine
    #[arg(long, default_value = "30")]
    sim_track_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jukebox_session=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting jukebox session controller on port {}", args.port);

    let mut settings = config::load_or_default(args.config.as_deref(), "JUKEBOX_CONFIG")
        .context("Failed to load settings")?;
    if let Some(library) = args.library {
        settings.library_dir = library;
    }
    info!("Library: {}", settings.library_dir.display());

    let catalog = Arc::new(Catalog::scan(&settings));
    info!("Catalog ready with {} tracks", catalog.len());

    let shared = Arc::new(SharedState::new(EventBus::new(settings.event_bus_capacity)));

    let (engine, engine_rx) =
        SimulatedEngine::new(std::time::Duration::from_secs(args.sim_track_secs));
    let handle = SessionController::spawn(
        settings.clone(),
        engine,
        engine_rx,
        Arc::clone(&shared),
    );
    info!("Session controller running");

    // Build the application router
    let app_state = api::AppState {
        handle: handle.clone(),
        catalog,
        shared,
        port: args.port,
        library_dir: settings.library_dir.to_string_lossy().to_string(),
    };
    let app = api::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    handle.shutdown().await;
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
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
