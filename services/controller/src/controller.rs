//! Periodic reconciliation across all desired pools.
//!
//! Each tick reloads the desired pools, reads the promote flag fresh, and runs
//! one pass per pool. Passes for different pools run concurrently; a pool
//! never gets two passes in the same tick, and the pool lease keeps passes
//! from other controller processes out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bgpool_id::PoolName;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::parse_flag;
use crate::pass::{PassError, PassReport, PassRunner};
use crate::pools::{load_pools, DesiredPool};
use crate::store::{StateKeys, StateStore, StateStoreError};

/// Where desired pools come from.
#[derive(Debug, Clone)]
pub enum PoolSource {
    /// Reloaded from a TOML file on every tick.
    File(PathBuf),
    /// A fixed set, for tests and one-off runs.
    Static(Vec<DesiredPool>),
}

impl PoolSource {
    fn load(&self) -> Result<Vec<DesiredPool>> {
        match self {
            Self::File(path) => {
                load_pools(path).with_context(|| format!("Failed to load pools from {path:?}"))
            }
            Self::Static(pools) => Ok(pools.clone()),
        }
    }
}

/// Result of one pass within a tick.
#[derive(Debug)]
pub struct PoolOutcome {
    pub pool: PoolName,
    pub result: Result<PassReport, PassError>,
}

/// Results of one tick, ordered by pool name.
#[derive(Debug, Default)]
pub struct TickSummary {
    pub outcomes: Vec<PoolOutcome>,
    /// Pass tasks that panicked.
    pub panicked: usize,
}

impl TickSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded() + self.panicked
    }

    /// Passes that changed stored rollout state.
    pub fn mutations(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .filter(|r| r.action.kind() != bgpool_reconcile::ActionKind::NoChange)
            .count()
    }

    /// Passes that completed but reported a side-effect error.
    pub fn with_issues(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .filter(|r| r.issue.is_some())
            .count()
    }
}

/// Drives reconciliation ticks.
pub struct Controller {
    runner: Arc<PassRunner>,
    store: Arc<dyn StateStore>,
    pools: PoolSource,
    promote_override: Option<bool>,
    interval: Duration,
}

impl Controller {
    pub fn new(
        runner: Arc<PassRunner>,
        store: Arc<dyn StateStore>,
        pools: PoolSource,
        interval: Duration,
    ) -> Self {
        Self {
            runner,
            store,
            pools,
            promote_override: None,
            interval,
        }
    }

    /// Force the promote flag instead of reading it from the store.
    pub fn with_promote_override(mut self, promote: Option<bool>) -> Self {
        self.promote_override = promote;
        self
    }

    /// Run ticks until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            holder = %self.runner.holder(),
            "Starting reconciliation loop"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(summary) => info!(
                            passes_ok = summary.succeeded(),
                            passes_failed = summary.failed(),
                            mutations = summary.mutations(),
                            side_effect_errors = summary.with_issues(),
                            "Reconciliation tick complete"
                        ),
                        Err(e) => error!(error = %format!("{e:#}"), "Reconciliation tick failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Controller shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run a single tick.
    pub async fn run_once(&self) -> Result<TickSummary> {
        let pools = self.pools.load()?;
        let promote = self
            .read_promote_flag()
            .await
            .context("Failed to read promote flag")?;
        debug!(pool_count = pools.len(), promote, "Starting reconciliation tick");

        let mut tasks = JoinSet::new();
        for pool in pools {
            let runner = Arc::clone(&self.runner);
            tasks.spawn(async move {
                let result = runner.run_pass(&pool.name, &pool.spec, promote).await;
                PoolOutcome {
                    pool: pool.name,
                    result,
                }
            });
        }

        let mut summary = TickSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let Err(e) = &outcome.result {
                        warn!(pool = %outcome.pool, error = %e, "Reconciliation pass failed");
                    }
                    summary.outcomes.push(outcome);
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation pass task panicked");
                    summary.panicked += 1;
                }
            }
        }
        summary.outcomes.sort_by(|a, b| a.pool.cmp(&b.pool));

        Ok(summary)
    }

    /// The cluster-wide promote flag, read fresh.
    async fn read_promote_flag(&self) -> Result<bool, StateStoreError> {
        if let Some(promote) = self.promote_override {
            return Ok(promote);
        }

        let settings = self.runner.settings();
        let key = StateKeys::cluster_promote_flag(&settings.key_prefix, &settings.cluster);
        let value = tokio::time::timeout(settings.call_timeout, self.store.get(&key))
            .await
            .map_err(|_| StateStoreError::Timeout {
                op: "get",
                key: key.clone(),
                timeout: settings.call_timeout,
            })??;

        Ok(value.as_deref().is_some_and(parse_flag))
    }
}
