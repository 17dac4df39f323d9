//! Reconcile command.
//!
//! Runs one tick against the state store with the recording provisioner, so
//! no infrastructure is touched. Useful for previewing and for driving a
//! rollout by hand.

use std::sync::Arc;

use anyhow::Result;
use bgpool_controller::{
    Controller, PassRunner, PoolOutcome, PoolSource, RecordingBridge, RecordingProvisioner,
};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{display_option, print_output, print_single, print_warning, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ReconcileCommand {
    /// Promote candidates regardless of the stored flag.
    #[arg(long, conflicts_with = "no_promote")]
    promote: bool,

    /// Never promote, regardless of the stored flag.
    #[arg(long)]
    no_promote: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct PassRow {
    #[tabled(rename = "Pool")]
    pool: String,

    #[tabled(rename = "Action")]
    action: String,

    #[tabled(rename = "Phase", display = "display_option")]
    phase: Option<String>,

    #[tabled(rename = "Active", display = "display_option")]
    active: Option<String>,

    #[tabled(rename = "Candidate", display = "display_option")]
    candidate: Option<String>,

    #[tabled(rename = "Requested", display = "display_option")]
    requested: Option<String>,

    #[tabled(rename = "Error", display = "display_option")]
    error: Option<String>,
}

impl ReconcileCommand {
    fn promote_override(&self) -> Option<bool> {
        match (self.promote, self.no_promote) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let store = ctx.open_or_create_store()?;
        let runner = Arc::new(PassRunner::new(
            ctx.pass_settings(),
            store.clone(),
            Arc::new(RecordingProvisioner::new()),
            Arc::new(RecordingBridge::new()),
        ));

        let controller = Controller::new(
            runner,
            store,
            PoolSource::Static(ctx.load_pools()?),
            std::time::Duration::ZERO,
        )
        .with_promote_override(self.promote_override());

        let summary = controller.run_once().await?;

        match ctx.format {
            OutputFormat::Table => {
                let rows: Vec<_> = summary.outcomes.iter().map(pass_row).collect();
                print_output(&rows, ctx.format);
            }
            OutputFormat::Json => {
                let items: Vec<_> = summary.outcomes.iter().map(pass_json).collect();
                print_single(&items);
            }
        }

        if summary.failed() > 0 {
            print_warning(&format!("{} pass(es) failed", summary.failed()));
        }
        Ok(())
    }
}

fn pass_row(outcome: &PoolOutcome) -> PassRow {
    match &outcome.result {
        Ok(report) => PassRow {
            pool: outcome.pool.to_string(),
            action: report.outcome().to_string(),
            phase: Some(report.phase.to_string()),
            active: report.active.as_ref().map(|r| r.handle.to_string()),
            candidate: report.candidate.as_ref().map(|r| r.handle.to_string()),
            requested: (!report.provision_requested.is_empty()).then(|| {
                report
                    .provision_requested
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            }),
            error: report.issue.as_ref().map(ToString::to_string),
        },
        Err(e) => PassRow {
            pool: outcome.pool.to_string(),
            action: "failed".to_string(),
            phase: None,
            active: None,
            candidate: None,
            requested: None,
            error: Some(e.to_string()),
        },
    }
}

fn pass_json(outcome: &PoolOutcome) -> serde_json::Value {
    match &outcome.result {
        Ok(report) => serde_json::to_value(report).unwrap_or_else(|_| serde_json::json!({})),
        Err(e) => serde_json::json!({
            "pool": outcome.pool.as_str(),
            "error": e.to_string(),
        }),
    }
}
