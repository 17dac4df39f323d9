//! Configuration for the controller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bgpool_id::{ClusterName, IdError};
use thiserror::Error;

use crate::pass::PassSettings;
use crate::store::DEFAULT_KEY_PREFIX;

/// Errors loading configuration or the desired pools file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("invalid value for {name}: '{value}' ({reason})")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid pool name '{name}': {source}")]
    InvalidPool {
        name: String,
        #[source]
        source: IdError,
    },
}

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cluster whose pools this controller reconciles.
    pub cluster: ClusterName,

    /// Data directory for the embedded state store.
    pub data_dir: String,

    /// TOML file describing the desired node pools.
    pub pools_file: String,

    /// Top-level prefix of state store keys.
    pub key_prefix: String,

    /// Seconds between reconciliation ticks.
    pub reconcile_interval_secs: u64,

    /// Bound on each store, provisioner, and bridge call, in milliseconds.
    pub call_timeout_ms: u64,

    /// Pool lease lifetime in seconds.
    pub lease_ttl_secs: u64,

    /// Promote flag forced from the environment. When unset the flag is read
    /// from the state store on every tick.
    pub promote_override: Option<bool>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cluster_raw = lookup("BGPOOL_CLUSTER").unwrap_or_else(|| "default".to_string());
        let cluster = ClusterName::parse(&cluster_raw).map_err(|e| ConfigLoadError::InvalidVar {
            name: "BGPOOL_CLUSTER",
            value: cluster_raw.clone(),
            reason: e.to_string(),
        })?;

        let data_dir = lookup("BGPOOL_DATA_DIR").unwrap_or_else(|| "/var/lib/bgpool".to_string());

        let pools_file =
            lookup("BGPOOL_POOLS_FILE").unwrap_or_else(|| "/etc/bgpool/pools.toml".to_string());

        let key_prefix =
            lookup("BGPOOL_KEY_PREFIX").unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());

        let reconcile_interval_secs =
            parse_u64(&lookup, "BGPOOL_RECONCILE_INTERVAL_SECS", 60)?;
        let call_timeout_ms = parse_u64(&lookup, "BGPOOL_CALL_TIMEOUT_MS", 10_000)?;
        let lease_ttl_secs = parse_u64(&lookup, "BGPOOL_LEASE_TTL_SECS", 30)?;

        let promote_override = lookup("BGPOOL_PROMOTE_NODEPOOLS").map(|v| parse_flag(&v));

        let log_level = lookup("BGPOOL_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            cluster,
            data_dir,
            pools_file,
            key_prefix,
            reconcile_interval_secs,
            call_timeout_ms,
            lease_ttl_secs,
            promote_override,
            log_level,
        })
    }

    /// Path of the SQLite state store.
    pub fn state_db_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("state.db")
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn pass_settings(&self) -> PassSettings {
        PassSettings {
            cluster: self.cluster.clone(),
            key_prefix: self.key_prefix.clone(),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            lease_ttl: Duration::from_secs(self.lease_ttl_secs),
        }
    }
}

/// Interpret a boolean flag value. Anything but `1`/`true` is false.
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_u64<F>(lookup: &F, name: &'static str, default: u64) -> Result<u64, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };

    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigLoadError::InvalidVar {
            name,
            value: raw,
            reason: "must be greater than 0".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigLoadError::InvalidVar {
            name,
            value: raw,
            reason: e.to_string(),
        }),
    }
}
