//! # Proximity Subcommand
//!
//! `campus proximity check` applies the configured proximity policy to a
//! target and a measured coordinate. Exit 0 within range, 2 out of range.

use anyhow::Result;
use campus_core::GeoPoint;
use campus_geo::{ProximityPolicy, ProximityResult};
use clap::{Args, Subcommand};
use serde::Serialize;

/// Arguments for `campus proximity`.
#[derive(Args, Debug)]
pub struct ProximityArgs {
    #[command(subcommand)]
    pub command: ProximityCommand,
}

/// Proximity subcommands.
#[derive(Subcommand, Debug)]
pub enum ProximityCommand {
    /// Check a measured position against a property.
    Check {
        /// Property coordinate as LAT,LNG.
        #[arg(long, value_parser = crate::parse_point)]
        target: GeoPoint,
        /// Measured coordinate as LAT,LNG.
        #[arg(long, value_parser = crate::parse_point)]
        at: GeoPoint,
        /// Reported accuracy radius in meters.
        #[arg(long, default_value_t = 0.0)]
        accuracy: f64,
        /// Override the configured threshold.
        #[arg(long)]
        threshold: Option<f64>,
        /// Emit JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct CheckReport {
    #[serde(flatten)]
    result: ProximityResult,
    threshold_meters: f64,
}

/// Execute the proximity subcommand.
pub fn run_proximity(args: &ProximityArgs, policy: ProximityPolicy) -> Result<u8> {
    match &args.command {
        ProximityCommand::Check {
            target,
            at,
            accuracy,
            threshold,
            json,
        } => {
            let policy = ProximityPolicy {
                threshold_meters: threshold.unwrap_or(policy.threshold_meters),
                ..policy
            };
            let result = policy.check(target, at, *accuracy);
            if *json {
                let report = CheckReport {
                    result,
                    threshold_meters: policy.threshold_meters,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render(&result, policy.threshold_meters));
            }
            Ok(if result.within_range { 0 } else { 2 })
        }
    }
}

fn render(result: &ProximityResult, threshold: f64) -> String {
    let verdict = if result.within_range { "WITHIN RANGE" } else { "TOO FAR" };
    let mut line = format!(
        "{verdict}: {:.1} m from target (threshold {threshold:.0} m)",
        result.distance_meters
    );
    if result.degraded_accuracy {
        line.push_str(" [degraded accuracy]");
    }
    line
}
