//! Party Replication - in-process replication session
//!
//! Starts one peer per configured player role. Each peer hosts a bot-driven
//! avatar with authority and observes every other peer's avatar through the
//! snapshot stream, until the session time runs out or a shutdown signal
//! arrives.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use party_replication::app::AppState;
use party_replication::config::{Config, LogFormat};
use party_replication::game::input::WanderBot;
use party_replication::game::{Role, Spawner};

/// Spawn ring radius in meters
const SPAWN_RADIUS: f32 = 6.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    info!("Starting party replication session");
    info!(
        simulation_tps = config.simulation_tps,
        serialization_rate = config.serialization_rate,
        schema_version = ?config.schema_version,
        roles = ?config.player_roles,
        "Session settings"
    );

    let state = AppState::new(config.clone());
    let mut spawner = Spawner::ring(
        config.player_roles.len().max(1) * 2,
        SPAWN_RADIUS,
        config.spawn_seed,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut peers = Vec::new();
    for (index, name) in config.player_roles.iter().enumerate() {
        let role = Role::from_name(name);
        let mut peer = state.connect_peer();
        let spawn = spawner.spawn(role, config.movement);
        let bot = WanderBot::new(config.spawn_seed.wrapping_add(index as u64 + 1));
        peer.host(spawn, Box::new(bot), None)?;
        peers.push(tokio::spawn(peer.run(shutdown_rx.clone())));
    }

    if peers.is_empty() {
        warn!("No player roles configured, nothing to host");
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(config.session_seconds)) => {
            info!("Session time elapsed");
        }
        _ = shutdown_signal() => {}
    }
    let _ = shutdown_tx.send(true);

    for peer in peers {
        let report = peer.await?;
        for view in report.entities.iter().filter(|v| !v.authority) {
            info!(
                peer_id = %report.peer_id,
                entity_id = %view.id,
                variant = ?view.variant,
                tracking_error = ?view.tracking_error,
                "Observer tracking"
            );
        }
    }

    info!(entities = state.directory.len(), "Session shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, log_format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
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
