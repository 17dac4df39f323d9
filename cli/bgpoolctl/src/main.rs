//! bgpoolctl - operator CLI for the bgpool controller
//!
//! Inspects and drives blue/green node-pool rollouts against the controller's
//! state store.

use anyhow::Result;
use clap::Parser;

mod commands;
mod error;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
