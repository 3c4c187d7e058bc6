//! # ldsync
//!
//! Command-line entry point. See [`ldsync::cli`] for the command surface.

use clap::Parser;
use ldsync::cli::{run, Cli};
use ldsync::runtime::setup_tracing;
use std::process::ExitCode;
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing once for the entire application
    setup_tracing(cli.verbose);
    debug!(command = ?cli.command, "Starting");

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
