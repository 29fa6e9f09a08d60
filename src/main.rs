//! Royale Arena Server - match orchestrator for a shared-world battle royale
//!
//! This is the main entry point. It handles:
//! - The arena runtime that owns matches, the border and the rollback journal
//! - The WebSocket endpoint world bridges connect to
//! - The admin HTTP API

mod app;
mod arena;
mod config;
mod game;
mod host;
mod http;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::arena::{Arena, ArenaStore, SafeSpotFinder};
use crate::config::{Config, GameSettings};
use crate::game::{ArenaRuntime, MatchRegistry};
use crate::http::build_router;
use crate::util::time::init_server_time;

/// Commands buffered per bridge before it counts as lagging
const COMMAND_BUFFER: usize = 4096;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level);
    init_server_time();

    info!("Starting Royale Arena Server");
    info!("Server address: {}", config.server_addr);

    let settings = GameSettings::load(&config.settings_path);
    let store = ArenaStore::new(&config.arena_path);
    let arena = match store.load() {
        Ok(arena) => arena,
        Err(e) => {
            warn!(path = %store.path().display(), error = %e, "Failed to load arena, starting undefined");
            Arena::default()
        }
    };
    info!(defined = arena.is_defined(), size = arena.size(), "Arena loaded");

    let registry = MatchRegistry::new(settings, arena, SafeSpotFinder::from_entropy());
    let (commands, _) = broadcast::channel(COMMAND_BUFFER);
    let (runtime, handle) =
        ArenaRuntime::new(registry, store, config.settings_path.clone(), commands);
    let runtime_task = tokio::spawn(runtime.run());

    let state = AppState::new(config.clone(), handle.clone());
    let router = build_router(state);

    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Bridge endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Roll the arena back before exiting
    handle.shutdown().await;
    if let Err(e) = runtime_task.await {
        warn!(error = %e, "Arena runtime task failed");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
