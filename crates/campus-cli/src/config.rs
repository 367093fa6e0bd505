//! # Config Subcommand
//!
//! - `campus config validate [FILE]`: parse and check every setting; exit 1 listing all violations.
//! - `campus config show`: print the effective configuration as YAML.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use campus_api::bootstrap::{BootstrapError, EngineConfig};
use clap::{Args, Subcommand};

/// Arguments for `campus config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate a configuration file.
    Validate {
        /// File to check. Falls back to the global `--config`.
        file: Option<PathBuf>,
    },
    /// Print the effective configuration.
    Show,
}

/// Execute the config subcommand.
pub fn run_config(args: &ConfigArgs, global_config: Option<&Path>) -> Result<u8> {
    match &args.command {
        ConfigCommand::Validate { file } => {
            let Some(path) = file.as_deref().or(global_config) else {
                bail!("no configuration file given; pass FILE or --config");
            };
            let (code, report) = validate_file(path)?;
            print!("{report}");
            Ok(code)
        }
        ConfigCommand::Show => {
            let config = crate::load_engine_config(global_config)?;
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(0)
        }
    }
}

/// Check `path`. Returns the exit code and the report text.
///
/// Invalid settings are a normal outcome (exit 1); a missing or unreadable
/// file is an error.
pub fn validate_file(path: &Path) -> Result<(u8, String)> {
    match EngineConfig::load(path) {
        Ok(_) => Ok((0, format!("OK {}\n", path.display()))),
        Err(BootstrapError::InvalidConfig { errors }) => {
            let mut report = format!("INVALID {}\n", path.display());
            for e in &errors {
                report.push_str("  - ");
                report.push_str(e);
                report.push('\n');
            }
            Ok((1, report))
        }
        Err(BootstrapError::Parse(e)) => Ok((1, format!("INVALID {}\n  - {e}\n", path.display()))),
        Err(e) => Err(e.into()),
    }
}
