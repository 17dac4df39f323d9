//! bgpool controller
//!
//! Runs reconciliation ticks for every node pool in the desired pools file
//! until interrupted.
//!
//! ## Architecture
//!
//! - **State store**: embedded SQLite file under the data directory
//! - **Pass runner**: digest, lease, decide, persist, then side effects
//! - **Provisioner/bridge**: recording implementations that log requests

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bgpool_controller::config::Config;
use bgpool_controller::{
    Controller, PassRunner, PoolSource, RecordingBridge, RecordingProvisioner, SqliteStateStore,
    StateStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to BGPOOL_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting bgpool controller");
    info!(
        cluster = %config.cluster,
        data_dir = %config.data_dir,
        pools_file = %config.pools_file,
        key_prefix = %config.key_prefix,
        interval_secs = config.reconcile_interval_secs,
        promote_override = ?config.promote_override,
        "Configuration loaded"
    );

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data dir {}", config.data_dir))?;
    let store: Arc<dyn StateStore> = Arc::new(
        SqliteStateStore::open(config.state_db_path()).context("Failed to open state store")?,
    );

    let runner = Arc::new(PassRunner::new(
        config.pass_settings(),
        Arc::clone(&store),
        Arc::new(RecordingProvisioner::new()),
        Arc::new(RecordingBridge::new()),
    ));

    let controller = Controller::new(
        runner,
        store,
        PoolSource::File(PathBuf::from(&config.pools_file)),
        config.reconcile_interval(),
    )
    .with_promote_override(config.promote_override);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_handle = tokio::spawn(async move { controller.run(shutdown_rx).await });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);
    if let Err(e) = controller_handle.await {
        tracing::error!(error = %e, "Controller task panicked");
    }

    info!("Controller shutdown complete");
    Ok(())
}
