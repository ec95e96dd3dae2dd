//! Rock Music Automation (rma-auto) - Main entry point
//!
//! Loads configuration, opens the catalog, probes the content layer, then
//! runs the workers under the supervisor until Ctrl+C / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rma_auto::workers::monitor::probe_initial_playback;
use rma_auto::workers::supervisor::Supervisor;
use rma_auto::workers::WorkerContext;
use rma_auto::{catalog::CatalogStore, telemetry, ControlHandle, Error, SharedState};
use rma_common::config::{resolve_config_path, AutomationConfig};
use rma_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for rma-auto
#[derive(Parser, Debug)]
#[command(name = "rma-auto")]
#[command(about = "Playout automation engine for rock music video channels")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "RMA_CONFIG")]
    config: Option<PathBuf>,

    /// Playout server host
    #[arg(long, env = "RMA_AMCP_HOST")]
    host: Option<String>,

    /// Playout server port
    #[arg(short, long, env = "RMA_AMCP_PORT")]
    port: Option<u16>,

    /// Catalog database file
    #[arg(long, env = "RMA_DATABASE")]
    database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut AutomationConfig) {
        if let Some(host) = &self.host {
            config.amcp.host = host.clone();
        }
        if let Some(port) = self.port {
            config.amcp.port = port;
        }
        if let Some(database) = &self.database {
            config.database.path = database.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.debug {
            config.logging.level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = AutomationConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    args.apply_overrides(&mut config);

    // RUST_LOG wins over the configured level
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("warn,rma_auto={0},rma_common={0}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config_path.exists() {
        info!("Configuration: {}", config_path.display());
    } else {
        warn!("Config file {} not found, using built-in defaults", config_path.display());
    }
    config.validate().context("Invalid configuration")?;

    info!(
        "Starting rma-auto v{} against {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.amcp.host,
        config.amcp.port
    );
    info!("Catalog database: {}", config.database.path.display());

    let store = CatalogStore::open(&config.database.path)
        .await
        .context("Failed to open catalog database")?;

    let config = Arc::new(config);
    let shutdown = CancellationToken::new();
    let state = Arc::new(SharedState::new(EventBus::default()));
    let ctx = WorkerContext::new(config, store, state.clone(), shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });
    let event_log = tokio::spawn(telemetry::log_events(state.events().subscribe(), shutdown.clone()));

    let supervisor = Arc::new(Supervisor::new(ctx.clone()));
    let control = ControlHandle::new(ctx.clone(), supervisor.clone());

    // Startup trigger, unless a clip is already part-way through
    let probe = ctx.client();
    match probe_initial_playback(&probe, ctx.content_layer()).await {
        Ok(true) => info!("Clip already playing, next clip follows when it ends"),
        Ok(false) => control.play_next(),
        Err(Error::Shutdown) => {
            info!("Shutdown during startup");
            return Ok(());
        }
        Err(e) => {
            warn!("Startup probe failed ({}), starting playback", e);
            control.play_next();
        }
    }
    probe.disconnect().await;

    supervisor.start_all().await;
    supervisor.run().await;

    control.disconnect().await;
    if let Err(e) = event_log.await {
        error!("Event log task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
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
