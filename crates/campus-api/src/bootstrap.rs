//! # Engine Bootstrap
//!
//! Loads the engine policy file and wires collaborators into [`AppState`].
//!
//! ## Bootstrap Sequence
//!
//! 1. **Load EngineConfig**: parse YAML from `CAMPUS_CONFIG`, or use defaults.
//! 2. **Validate**: collect every out-of-range setting, fail with all of them.
//! 3. **Open Draft Store**: file-backed under `audit.draft_dir`.
//! 4. **Wire Collaborators**: remote clients when configured, otherwise 503 stand-ins.
//!
//! ```yaml
//! proximity:
//!   threshold_meters: 100
//!   degraded_accuracy_meters: 50
//!   request_timeout_secs: 15
//!   check_in_ttl_secs: 600
//! escrow:
//!   default_commission_bps: 1000
//!   dispute_window_hours: 72
//!   auto_release_after_hours: 48
//! audit:
//!   min_media: 2
//!   draft_dir: ./drafts
//! ```

use std::path::Path;
use std::sync::Arc;

use campus_audit::{AuditConfig, DraftStoreError, FileDraftStore};
use campus_client::CampusClient;
use campus_escrow::{EscrowConfig, EscrowError};
use campus_geo::ProximityPolicy;
use serde::{Deserialize, Serialize};

use crate::state::{AppConfig, AppState, Collaborators};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors during startup.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Config file not found at the given path.
    #[error("engine config not found: {path}")]
    ConfigNotFound { path: String },

    /// Config file is not valid YAML for [`EngineConfig`].
    #[error("engine config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Config values out of range.
    #[error("invalid engine config: {errors:?}")]
    InvalidConfig { errors: Vec<String> },

    /// Draft directory could not be opened.
    #[error("draft store: {0}")]
    DraftStore(#[from] DraftStoreError),

    /// Ledger construction failed.
    #[error("escrow ledger: {0}")]
    Escrow(#[from] EscrowError),

    /// IO error reading the config.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Policy knobs for every engine component. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub proximity: ProximityPolicy,
    pub escrow: EscrowConfig,
    pub audit: AuditConfig,
}

impl EngineConfig {
    /// Parse and validate YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, BootstrapError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, BootstrapError> {
        if !path.exists() {
            return Err(BootstrapError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Check every setting, reporting all violations at once.
    pub fn validate(&self) -> Result<(), BootstrapError> {
        let mut errors = Vec::new();
        let p = &self.proximity;
        if !(p.threshold_meters.is_finite() && p.threshold_meters > 0.0) {
            errors.push(format!(
                "proximity.threshold_meters must be positive, got {}",
                p.threshold_meters
            ));
        }
        if !(p.degraded_accuracy_meters.is_finite() && p.degraded_accuracy_meters > 0.0) {
            errors.push(format!(
                "proximity.degraded_accuracy_meters must be positive, got {}",
                p.degraded_accuracy_meters
            ));
        }
        if p.request_timeout_secs == 0 {
            errors.push("proximity.request_timeout_secs must be at least 1".into());
        }
        if p.check_in_ttl_secs == 0 {
            errors.push("proximity.check_in_ttl_secs must be at least 1".into());
        }
        let e = &self.escrow;
        if e.default_commission_bps > 10_000 {
            errors.push(format!(
                "escrow.default_commission_bps must be at most 10000, got {}",
                e.default_commission_bps
            ));
        }
        if e.dispute_window_hours < 0 {
            errors.push(format!(
                "escrow.dispute_window_hours must not be negative, got {}",
                e.dispute_window_hours
            ));
        }
        if e.auto_release_after_hours < 0 {
            errors.push(format!(
                "escrow.auto_release_after_hours must not be negative, got {}",
                e.auto_release_after_hours
            ));
        }
        if self.audit.min_media == 0 {
            errors.push("audit.min_media must be at least 1".into());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BootstrapError::InvalidConfig { errors })
        }
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Build [`AppState`] from server settings, engine policy and optional
/// remote collaborators.
pub fn bootstrap(
    config: AppConfig,
    engine: EngineConfig,
    client: Option<CampusClient>,
) -> Result<AppState, BootstrapError> {
    let drafts = Arc::new(FileDraftStore::open(engine.audit.draft_dir.clone())?);
    let collaborators = match client {
        Some(client) => Collaborators {
            scorer: Arc::new(client.scorer().clone()),
            submitter: Arc::new(client.intake().clone()),
            drafts,
            bank: Some(client.bank().clone()),
        },
        None => Collaborators::unconfigured(drafts),
    };

    tracing::info!(
        threshold_meters = engine.proximity.threshold_meters,
        commission_bps = engine.escrow.default_commission_bps,
        dispute_window_hours = engine.escrow.dispute_window_hours,
        auto_release_after_hours = engine.escrow.auto_release_after_hours,
        min_media = engine.audit.min_media,
        draft_dir = %engine.audit.draft_dir.display(),
        "engine configured"
    );

    Ok(AppState::new(config, engine, collaborators)?)
}
