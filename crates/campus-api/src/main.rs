//! # campus-api — Binary Entry Point
//!
//! Starts the Axum HTTP server. Environment:
//!
//! - `PORT` (default 8080), `AUTH_TOKEN` (unset disables auth)
//! - `CAMPUS_CONFIG`: YAML engine configuration; defaults apply when unset
//! - `AUTO_RELEASE_SWEEP_SECS` (default 300): auto-release and proximity expiry sweep interval
//! - `LOG_FORMAT=json` for JSON log lines
//! - collaborator endpoints, see `campus_client::CollaboratorConfig::from_env`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use campus_api::bootstrap::{bootstrap, EngineConfig};
use campus_api::state::AppConfig;
use campus_core::Timestamp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let auth_token = std::env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty());
    if auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set; every request is treated as admin");
    }
    let config = AppConfig { port, auth_token };

    let engine = match std::env::var("CAMPUS_CONFIG") {
        Ok(path) => EngineConfig::load(&PathBuf::from(&path))
            .with_context(|| format!("loading engine configuration from {path}"))?,
        Err(_) => {
            tracing::info!("CAMPUS_CONFIG not set; using default engine configuration");
            EngineConfig::default()
        }
    };

    let client = match campus_client::CollaboratorConfig::from_env() {
        Ok(collab) => {
            tracing::info!("collaborator clients configured");
            Some(campus_client::CampusClient::new(collab).context("building collaborator clients")?)
        }
        Err(e) => {
            tracing::warn!(
                "collaborators not configured: {e}. Scoring, report intake and bank lookup will return 503."
            );
            None
        }
    };

    let state = bootstrap(config, engine, client).context("bootstrap failed")?;

    let sweep_secs: u64 = std::env::var("AUTO_RELEASE_SWEEP_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|s| *s > 0)
        .unwrap_or(300);
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(sweep_secs));
        loop {
            tick.tick().await;
            let now = Timestamp::now();
            let released = sweeper.ledger.sweep_auto_release(now);
            if !released.is_empty() {
                tracing::info!(count = released.len(), "auto-released fulfilled orders");
            }
            let (sessions, check_ins) = sweeper.sweep_expired(now);
            if sessions + check_ins > 0 {
                tracing::info!(sessions, check_ins, "expired proximity sessions and check-ins dropped");
            }
        }
    });

    let app = campus_api::app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("campus API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
