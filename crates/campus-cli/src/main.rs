//! # campus CLI entry point
//!
//! Parses arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use campus_cli::config::{run_config, ConfigArgs};
use campus_cli::escrow::{run_escrow, EscrowArgs};
use campus_cli::proximity::{run_proximity, ProximityArgs};

/// Trust engine operator CLI.
///
/// Validates engine configuration and evaluates the proximity, commission
/// and disclosure policies offline.
#[derive(Parser, Debug)]
#[command(name = "campus", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Engine configuration file (YAML).
    #[arg(long, global = true, env = "CAMPUS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate or print the engine configuration.
    Config(ConfigArgs),
    /// Evaluate the proximity rule.
    Proximity(ProximityArgs),
    /// Commission splits, disclosure and the escrow state table.
    Escrow(EscrowArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Config(args) => run_config(args, config_path),
        Commands::Proximity(args) => campus_cli::load_engine_config(config_path)
            .and_then(|c| run_proximity(args, c.proximity)),
        Commands::Escrow(args) => {
            campus_cli::load_engine_config(config_path).and_then(|c| run_escrow(args, &c.escrow))
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
