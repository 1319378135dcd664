//! fedsync-import - federation data import service
//!
//! Runs the import pipeline on a cron schedule and serves the import
//! administration API (status, logs, manual trigger, connection test).

use anyhow::{Context, Result};
use clap::Parser;
use fedsync_import::config::ServiceConfig;
use fedsync_import::services::{CronTrigger, InFlightGauge, LoadSensor, PeriodicTrigger, SyncCoordinator};
use fedsync_import::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "fedsync-import", version, about = "Federation data import service")]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, env = "FEDSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Write the effective configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServiceConfig::load(args.config.as_deref()).context("loading configuration")?;

    if let Some(path) = &args.write_config {
        fedsync_common::config::write_toml_config(&config, path)
            .with_context(|| format!("writing configuration to {}", path.display()))?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    fedsync_common::logging::init(&config.logging)?;

    info!("Starting fedsync-import");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    config.source.log();
    info!(
        enabled = config.import.enabled,
        schedule = %config.import.schedule,
        staging_dir = %config.import.staging_dir.display(),
        databases = ?config.import.databases.keys().collect::<Vec<_>>(),
        remote = ?config.import.remote,
        "Import configuration"
    );

    let gauge = Arc::new(InFlightGauge::new(
        config.import.backpressure.max_in_flight_requests,
    ));
    let sensor: Arc<dyn LoadSensor> = gauge.clone();
    let coordinator = Arc::new(
        SyncCoordinator::from_config(config.import.clone(), Some(sensor))
            .context("building import coordinator")?,
    );

    let mut trigger = CronTrigger::new(config.import.schedule.clone(), Arc::clone(&coordinator));
    trigger.start().await.context("starting periodic trigger")?;

    let app = fedsync_import::build_router(AppState::new(Arc::clone(&coordinator), gauge));

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    info!("Listening on http://{}", config.server.bind);
    info!("Health check: http://{}/health", config.server.bind);

    let shutdown_coordinator = Arc::clone(&coordinator);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
            shutdown_coordinator.stop();
        })
        .await?;

    trigger.shutdown().await?;
    coordinator.drain_notifications().await;
    info!("fedsync-import stopped");
    Ok(())
}
