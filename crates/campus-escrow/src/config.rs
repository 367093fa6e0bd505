//! Escrow policy settings.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Escrow policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Commission applied when an order does not specify one.
    pub default_commission_bps: u32,
    /// How long after release a buyer may still dispute.
    pub dispute_window_hours: i64,
    /// How long after fulfilment a held order is auto-released.
    pub auto_release_after_hours: i64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            default_commission_bps: 1000,
            dispute_window_hours: 72,
            auto_release_after_hours: 48,
        }
    }
}

impl EscrowConfig {
    /// Dispute window as a duration.
    pub fn dispute_window(&self) -> Duration {
        Duration::hours(self.dispute_window_hours)
    }

    /// Auto-release delay as a duration.
    pub fn auto_release_after(&self) -> Duration {
        Duration::hours(self.auto_release_after_hours)
    }
}
