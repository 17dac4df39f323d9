//! CLI commands.

mod digest;
mod promote;
mod reconcile;
mod status;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bgpool_controller::{load_pools, DesiredPool, PassSettings, SqliteStateStore, StateKeys};
use bgpool_id::{ClusterName, PoolName};
use clap::{Parser, Subcommand};

use crate::error::CliError;
use crate::output::OutputFormat;

/// bgpoolctl - Inspect and drive blue/green node-pool rollouts.
#[derive(Debug, Parser)]
#[command(name = "bgpoolctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Path of the controller's SQLite state store.
    #[arg(long, global = true, env = "BGPOOL_DB", default_value = "/var/lib/bgpool/state.db")]
    db: PathBuf,

    /// Cluster whose pools to operate on.
    #[arg(long, global = true, env = "BGPOOL_CLUSTER", default_value = "default")]
    cluster: String,

    /// TOML file describing the desired node pools.
    #[arg(
        long,
        global = true,
        env = "BGPOOL_POOLS_FILE",
        default_value = "/etc/bgpool/pools.toml"
    )]
    pools: PathBuf,

    /// Top-level prefix of state store keys.
    #[arg(long, global = true, env = "BGPOOL_KEY_PREFIX", default_value = "bgpool")]
    key_prefix: String,

    /// Bound on each store and provisioner call, in milliseconds.
    #[arg(long, global = true, env = "BGPOOL_CALL_TIMEOUT_MS", default_value = "10000")]
    call_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the configuration digest and pool handle of each desired pool.
    Digest(digest::DigestCommand),

    /// Show the recorded rollout state of each desired pool.
    Status(status::StatusCommand),

    /// Turn the cluster-wide promote flag on or off.
    Promote(promote::PromoteCommand),

    /// Run one reconciliation pass for every desired pool.
    Reconcile(reconcile::ReconcileCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let cluster = ClusterName::parse(&self.cluster)
            .with_context(|| format!("Invalid cluster name '{}'", self.cluster))?;

        let ctx = CommandContext {
            format: OutputFormat::parse(&self.format),
            db: self.db,
            cluster,
            pools_file: self.pools,
            key_prefix: self.key_prefix,
            call_timeout: Duration::from_millis(self.call_timeout_ms.max(1)),
        };

        match self.command {
            Commands::Digest(cmd) => cmd.run(ctx).await,
            Commands::Status(cmd) => cmd.run(ctx).await,
            Commands::Promote(cmd) => cmd.run(ctx).await,
            Commands::Reconcile(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("bgpoolctl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub format: OutputFormat,
    pub db: PathBuf,
    pub cluster: ClusterName,
    pub pools_file: PathBuf,
    pub key_prefix: String,
    pub call_timeout: Duration,
}

impl CommandContext {
    /// Desired pools from the pools file.
    pub fn load_pools(&self) -> Result<Vec<DesiredPool>> {
        load_pools(&self.pools_file)
            .with_context(|| format!("Failed to load pools from {:?}", self.pools_file))
    }

    /// Open the existing state store.
    pub fn open_store(&self) -> Result<Arc<SqliteStateStore>> {
        if !self.db.exists() {
            return Err(CliError::StoreNotFound(self.db.clone()).into());
        }
        self.open_or_create_store()
    }

    /// Open the state store, creating it if missing.
    pub fn open_or_create_store(&self) -> Result<Arc<SqliteStateStore>> {
        if let Some(parent) = self.db.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {parent:?}"))?;
        }
        let store = SqliteStateStore::open(&self.db)
            .with_context(|| format!("Failed to open state store {:?}", self.db))?;
        Ok(Arc::new(store))
    }

    pub fn keys(&self, pool: &PoolName) -> StateKeys {
        StateKeys::new(&self.key_prefix, &self.cluster, pool)
    }

    pub fn promote_flag_key(&self) -> String {
        StateKeys::cluster_promote_flag(&self.key_prefix, &self.cluster)
    }

    pub fn pass_settings(&self) -> PassSettings {
        PassSettings {
            cluster: self.cluster.clone(),
            key_prefix: self.key_prefix.clone(),
            call_timeout: self.call_timeout,
            lease_ttl: Duration::from_secs(30),
        }
    }
}
