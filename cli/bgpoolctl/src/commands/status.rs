//! Status command.
//!
//! Reads the recorded rollout state of every desired pool. Operators use the
//! handles shown here to find pools to drain.

use anyhow::{Context, Result};
use bgpool_controller::config::parse_flag;
use bgpool_controller::{SqliteStateStore, StateStore};
use bgpool_id::PoolName;
use bgpool_reconcile::{ConfigDigest, OwedRequests, PoolHandle, RolloutState};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{display_option, print_info, print_output, print_single, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct StatusCommand {}

#[derive(Debug, Serialize, Tabled)]
struct PoolStatusRow {
    #[tabled(rename = "Pool")]
    pool: String,

    #[tabled(rename = "Phase")]
    phase: String,

    #[tabled(rename = "Active", display = "display_option")]
    active: Option<String>,

    #[tabled(rename = "Candidate", display = "display_option")]
    candidate: Option<String>,

    #[tabled(rename = "Pending Requests", display = "display_option")]
    pending_requests: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    cluster: String,
    promote: bool,
    pools: Vec<PoolStatusRow>,
}

impl StatusCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let pools = ctx.load_pools()?;
        let store = ctx.open_store()?;

        let promote = read(&ctx, &store, &ctx.promote_flag_key())
            .await?
            .as_deref()
            .is_some_and(parse_flag);

        let mut rows = Vec::with_capacity(pools.len());
        for pool in &pools {
            let keys = ctx.keys(&pool.name);
            let active = read(&ctx, &store, &keys.active()).await?;
            let candidate = read(&ctx, &store, &keys.candidate()).await?;
            let pending = read(&ctx, &store, &keys.pending_request()).await?;
            rows.push(status_row(&pool.name, active, candidate, pending));
        }

        match ctx.format {
            OutputFormat::Table => {
                print_output(&rows, ctx.format);
                print_info(&format!(
                    "Promotion is {} for cluster {}",
                    if promote { "on" } else { "off" },
                    ctx.cluster
                ));
            }
            OutputFormat::Json => print_single(&StatusResponse {
                cluster: ctx.cluster.to_string(),
                promote,
                pools: rows,
            }),
        }
        Ok(())
    }
}

async fn read(ctx: &CommandContext, store: &SqliteStateStore, key: &str) -> Result<Option<String>> {
    tokio::time::timeout(ctx.call_timeout, store.get(key))
        .await
        .with_context(|| format!("Timed out reading {key}"))?
        .with_context(|| format!("Failed to read {key}"))
}

/// Build a row from raw stored values. Values that are not digests are shown
/// as stored so a corrupt entry stays visible.
fn status_row(
    pool: &PoolName,
    active: Option<String>,
    candidate: Option<String>,
    pending: Option<String>,
) -> PoolStatusRow {
    let parse = |raw: &Option<String>| {
        raw.as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| ConfigDigest::parse(v).map_err(|_| v.to_string()))
    };
    let handle = |parsed: &Option<Result<ConfigDigest, String>>| {
        parsed.as_ref().map(|r| match r {
            Ok(digest) => PoolHandle::canonical(pool, digest).to_string(),
            Err(raw) => format!("{raw} (invalid)"),
        })
    };

    let active_digest = parse(&active);
    let candidate_digest = parse(&candidate);

    let phase = match (&active_digest, &candidate_digest) {
        (Some(Err(_)), _) | (_, Some(Err(_))) => "corrupt".to_string(),
        _ => {
            let mut state = RolloutState {
                active: active_digest.clone().and_then(Result::ok),
                candidate: candidate_digest.clone().and_then(Result::ok),
            };
            state.normalize();
            match state.validate() {
                Ok(()) => state.phase().to_string(),
                Err(_) => "corrupt".to_string(),
            }
        }
    };

    PoolStatusRow {
        pool: pool.to_string(),
        phase,
        active: handle(&active_digest),
        candidate: handle(&candidate_digest),
        pending_requests: pending.and_then(|raw| pending_summary(&raw)),
    }
}

/// Owed requests in issue order, e.g. `retire:abc123, ensure:candidate:def456`.
fn pending_summary(raw: &str) -> Option<String> {
    match OwedRequests::parse(raw) {
        Ok(owed) if owed.is_empty() => None,
        Ok(owed) => Some(
            owed.requests()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Err(_) => Some(format!("{} (invalid)", raw.trim())),
    }
}
