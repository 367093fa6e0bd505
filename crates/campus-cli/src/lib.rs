//! # campus-cli — Operator CLI for the Trust Engine
//!
//! Offline tooling around the engine's policies. Nothing here talks to the
//! API server or mutates a ledger.
//!
//! ## Subcommands
//!
//! - `campus config validate|show`: check or print the engine configuration.
//! - `campus proximity check`: run the proximity rule on a coordinate pair.
//! - `campus escrow split|disclose|transitions`: commission arithmetic,
//!   counterparty disclosure and the escrow state table.
//!
//! ```bash
//! campus --config engine.yaml config validate
//! campus proximity check --target 6.5158,3.3707 --at 6.5160,3.3707 --accuracy 12
//! campus escrow split --amount 20000 --bps 1000
//! ```

pub mod config;
pub mod escrow;
pub mod proximity;

use std::path::Path;

use anyhow::{Context, Result};
use campus_api::bootstrap::EngineConfig;
use campus_core::GeoPoint;

/// Load the engine configuration from `path`, or defaults when absent.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load(p)
            .with_context(|| format!("loading engine configuration from {}", p.display())),
        None => {
            tracing::debug!("no --config given; using default engine configuration");
            Ok(EngineConfig::default())
        }
    }
}

/// Parse `"lat,lng"` into a validated coordinate.
pub fn parse_point(raw: &str) -> Result<GeoPoint, String> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got {raw:?}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude {lat:?}"))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude {lng:?}"))?;
    GeoPoint::new(lat, lng).map_err(|e| e.to_string())
}
