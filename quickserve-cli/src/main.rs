//! Quickserve CLI - Command-line interface
//!
//! Drives the simulation study: distribution validation, single
//! replica runs, configuration optimization, and sensitivity sweeps.

mod commands;
mod report;
mod search;
mod sensitivity;
mod validate;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quickserve")]
#[command(about = "A discrete-event simulation study of a fast-food service network")]
struct Cli {
    /// Path to the JSON settings document
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
    /// Directory for CSV output
    #[arg(short, long, default_value = "results")]
    output: PathBuf,
    #[command(subcommand)]
    command: commands::Commands,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    commands::handle_command(&cli.config, &cli.output, cli.command)?;

    Ok(())
}
