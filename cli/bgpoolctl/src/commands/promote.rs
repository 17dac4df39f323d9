//! Promote command.

use anyhow::{Context, Result};
use bgpool_controller::StateStore;
use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::output::{print_single, print_success, print_warning, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct PromoteCommand {
    /// Whether candidates should be promoted on the next pass.
    #[arg(value_enum)]
    state: PromoteState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PromoteState {
    On,
    Off,
}

#[derive(Debug, Serialize)]
struct PromoteResponse {
    cluster: String,
    key: String,
    promote: bool,
}

impl PromoteCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let store = ctx.open_or_create_store()?;
        let key = ctx.promote_flag_key();
        let promote = self.state == PromoteState::On;

        tokio::time::timeout(ctx.call_timeout, store.set(&key, &promote.to_string()))
            .await
            .context("Timed out writing promote flag")?
            .context("Failed to write promote flag")?;

        match ctx.format {
            OutputFormat::Table => {
                let message = if promote {
                    format!("Candidates in cluster {} will be promoted", ctx.cluster)
                } else {
                    format!("Promotion disabled for cluster {}", ctx.cluster)
                };
                print_success(&message);
                if std::env::var_os("BGPOOL_PROMOTE_NODEPOOLS").is_some() {
                    print_warning(
                        "BGPOOL_PROMOTE_NODEPOOLS is set; a controller started with it ignores this flag",
                    );
                }
            }
            OutputFormat::Json => print_single(&PromoteResponse {
                cluster: ctx.cluster.to_string(),
                key,
                promote,
            }),
        }
        Ok(())
    }
}
