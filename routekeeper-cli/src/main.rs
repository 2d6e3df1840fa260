//! Routekeeper CLI - Command-line interface
//!
//! Validates route files and replays recorded fixes through a navigation
//! session, printing alerts and reroutes as they happen.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use routekeeper::config::ConfigFile;
use routekeeper::logging::init_logging;
use tracing::info;

use commands::replay::ReplayArgs;
use commands::validate::ValidateArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "routekeeper")]
#[command(version, about = "Route progress tracking and rerouting from position fixes")]
struct Cli {
    /// Config file (defaults to ~/.config/routekeeper/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check a route file and print its summary
    Validate(ValidateArgs),
    /// Replay recorded fixes against a route
    Replay(ReplayArgs),
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };
    let _log_guard = init_logging(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Routekeeper starting");

    match cli.command {
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Replay(args) => commands::replay::run(args, &config),
    }
}
