//! Error handling and display for the CLI.

use std::path::PathBuf;

use colored::Colorize;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("State store not found at {0:?}")]
    StoreNotFound(PathBuf),

    #[error("Pool not found in pools file: {0}")]
    PoolNotFound(String),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::StoreNotFound(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Pass --db or set BGPOOL_DB to the controller's state.db.".yellow()
                );
            }
            CliError::PoolNotFound(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Run `bgpoolctl digest` to list the pools in the pools file.".yellow()
                );
            }
        }
    }
}
