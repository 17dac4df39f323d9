//! Digest command.

use anyhow::{Context, Result};
use bgpool_reconcile::{digest, PoolHandle};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::print_output;

use super::CommandContext;

#[derive(Debug, Args)]
pub struct DigestCommand {
    /// Only print this pool.
    #[arg(long)]
    pool: Option<String>,
}

#[derive(Debug, Serialize, Tabled)]
struct DigestRow {
    #[tabled(rename = "Pool")]
    pool: String,

    #[tabled(rename = "Digest")]
    digest: String,

    #[tabled(rename = "Handle")]
    handle: String,

    #[tabled(rename = "Image")]
    image: String,
}

impl DigestCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let mut pools = ctx.load_pools()?;
        if let Some(name) = &self.pool {
            pools.retain(|p| p.name.as_str() == name);
            if pools.is_empty() {
                return Err(CliError::PoolNotFound(name.clone()).into());
            }
        }

        let rows = pools
            .iter()
            .map(|p| {
                let digest = digest(&p.spec)
                    .with_context(|| format!("Invalid spec for pool {}", p.name))?;
                Ok(DigestRow {
                    pool: p.name.to_string(),
                    handle: PoolHandle::canonical(&p.name, &digest).to_string(),
                    digest: digest.to_string(),
                    image: p.spec.image.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        print_output(&rows, ctx.format);
        Ok(())
    }
}
