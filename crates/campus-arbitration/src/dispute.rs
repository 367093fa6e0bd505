//! # Disputes
//!
//! The dispute aggregate. Status moves only through [`Dispute::resolve`],
//! and every move is logged with a digest of the decision that authorized it.

use campus_core::{
    sha256_digest, CanonicalBytes, ContentDigest, DisputeId, OrderId, OwnerId, TaskId, Timestamp,
};
use campus_escrow::SettlementOutcome;
use serde::{Deserialize, Serialize};

use crate::error::AdjudicationError;
use crate::scorer::AdvisoryBand;

/// Dispute status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Awaiting an administrator's decision.
    Pending,
    /// Decided for the buyer. Terminal.
    ResolvedBuyer,
    /// Decided for the seller. Terminal.
    ResolvedSeller,
}

impl DisputeStatus {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ResolvedBuyer => "resolved_buyer",
            Self::ResolvedSeller => "resolved_seller",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Statuses reachable in one step.
    pub fn valid_transitions(&self) -> &'static [DisputeStatus] {
        match self {
            Self::Pending => &[Self::ResolvedBuyer, Self::ResolvedSeller],
            Self::ResolvedBuyer | Self::ResolvedSeller => &[],
        }
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An administrator's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Refund the buyer.
    ResolvedBuyer,
    /// Pay the seller.
    ResolvedSeller,
}

impl Decision {
    /// Terminal dispute status for this decision.
    pub fn status(&self) -> DisputeStatus {
        match self {
            Self::ResolvedBuyer => DisputeStatus::ResolvedBuyer,
            Self::ResolvedSeller => DisputeStatus::ResolvedSeller,
        }
    }

    /// Ledger settlement for this decision.
    pub fn settlement(&self) -> SettlementOutcome {
        match self {
            Self::ResolvedBuyer => SettlementOutcome::RefundBuyer,
            Self::ResolvedSeller => SettlementOutcome::PaySeller,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        self.status().as_str()
    }
}

/// The scorer's assessment, stored on the dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceScore {
    /// Match score, 0–100.
    pub score: u8,
    /// Scorer's summary.
    pub summary: String,
    /// When it was recorded.
    pub scored_at: Timestamp,
}

/// One status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeTransition {
    /// Status before.
    pub from: DisputeStatus,
    /// Status after.
    pub to: DisputeStatus,
    /// When.
    pub at: Timestamp,
    /// Digest of the decision record that authorized it.
    pub decision_digest: ContentDigest,
}

#[derive(Serialize)]
struct DecisionRecord<'a> {
    dispute_id: DisputeId,
    order_id: OrderId,
    decision: Decision,
    admin_notes: &'a str,
    decided_at: String,
}

/// A buyer's dispute over an escrowed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    /// Identifier.
    pub id: DisputeId,
    /// Disputed order.
    pub order_id: OrderId,
    /// Verification task re-opened for this dispute, if any.
    pub task_id: Option<TaskId>,
    /// Buyer on the order.
    pub buyer_id: OwnerId,
    /// Seller on the order.
    pub seller_id: OwnerId,
    /// Buyer's stated reason.
    pub reason: String,
    /// Evidence URLs submitted by the buyer.
    pub buyer_evidence: Vec<String>,
    /// Current status.
    pub status: DisputeStatus,
    /// Advisory evidence assessment.
    pub ai_match: Option<EvidenceScore>,
    /// Administrator's notes.
    pub admin_notes: Option<String>,
    /// Administrator's decision.
    pub admin_decision: Option<Decision>,
    /// When it was raised.
    pub raised_at: Timestamp,
    /// When it was resolved.
    pub resolved_at: Option<Timestamp>,
    /// Status history.
    pub transition_log: Vec<DisputeTransition>,
}

impl Dispute {
    /// Advisory band of the current score, if scored.
    pub fn advisory_band(&self) -> Option<AdvisoryBand> {
        self.ai_match.as_ref().map(|m| AdvisoryBand::from_score(m.score))
    }

    /// Store a score. Never touches the status.
    pub fn record_score(&mut self, score: u8, summary: String) -> Result<(), AdjudicationError> {
        self.require_pending("score_dispute")?;
        self.ai_match = Some(EvidenceScore {
            score,
            summary,
            scored_at: Timestamp::now(),
        });
        Ok(())
    }

    /// Move to the terminal status for `decision`.
    ///
    /// Returns `false` if already resolved with the same decision.
    pub fn resolve(
        &mut self,
        decision: Decision,
        admin_notes: String,
    ) -> Result<bool, AdjudicationError> {
        let to = decision.status();
        if self.status == to {
            return Ok(false);
        }
        if !self.status.valid_transitions().contains(&to) {
            return Err(AdjudicationError::Conflict {
                dispute_id: self.id,
                current: self.status.as_str().to_string(),
                attempted: decision.as_str().to_string(),
            });
        }
        let now = Timestamp::now();
        let record = DecisionRecord {
            dispute_id: self.id,
            order_id: self.order_id,
            decision,
            admin_notes: &admin_notes,
            decided_at: now.to_canonical_string(),
        };
        let decision_digest = sha256_digest(&CanonicalBytes::new(&record)?);
        self.transition_log.push(DisputeTransition {
            from: self.status,
            to,
            at: now,
            decision_digest,
        });
        self.status = to;
        self.admin_decision = Some(decision);
        self.admin_notes = Some(admin_notes);
        self.resolved_at = Some(now);
        Ok(true)
    }

    fn require_pending(&self, operation: &'static str) -> Result<(), AdjudicationError> {
        if self.status != DisputeStatus::Pending {
            return Err(AdjudicationError::NotPending {
                dispute_id: self.id,
                status: self.status.as_str().to_string(),
                operation,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn pending() -> Dispute {
        Dispute {
            id: DisputeId::new(),
            order_id: OrderId::new(),
            task_id: None,
            buyer_id: OwnerId::new(),
            seller_id: OwnerId::new(),
            reason: "wrong size".into(),
            buyer_evidence: vec!["https://cdn.example/shoe.jpg".into()],
            status: DisputeStatus::Pending,
            ai_match: None,
            admin_notes: None,
            admin_decision: None,
            raised_at: Timestamp::now(),
            resolved_at: None,
            transition_log: Vec::new(),
        }
    }

    #[test]
    fn score_does_not_change_status() {
        let mut d = pending();
        d.record_score(95, "listing photos match".into()).unwrap();
        assert_eq!(d.status, DisputeStatus::Pending);
        assert_eq!(d.advisory_band(), Some(AdvisoryBand::GoodMatch));
    }

    #[test]
    fn resolve_logs_a_digest_and_is_terminal() {
        let mut d = pending();
        assert!(d.resolve(Decision::ResolvedSeller, "photos match".into()).unwrap());
        assert_eq!(d.status, DisputeStatus::ResolvedSeller);
        assert_eq!(d.transition_log.len(), 1);
        assert_eq!(d.transition_log[0].decision_digest.to_hex().len(), 64);
        assert!(d.resolved_at.is_some());

        assert!(!d.resolve(Decision::ResolvedSeller, "again".into()).unwrap());
        assert_eq!(d.admin_notes.as_deref(), Some("photos match"));
        assert_eq!(d.transition_log.len(), 1);
    }

    #[test]
    fn different_decision_after_resolution_conflicts() {
        let mut d = pending();
        d.resolve(Decision::ResolvedBuyer, "item damaged".into()).unwrap();
        let err = d.resolve(Decision::ResolvedSeller, "".into()).unwrap_err();
        assert!(matches!(err, AdjudicationError::Conflict { .. }));
        assert!(d.record_score(50, "late".into()).is_err());
    }

    #[test]
    fn decision_maps_to_settlement() {
        assert_eq!(Decision::ResolvedBuyer.settlement(), SettlementOutcome::RefundBuyer);
        assert_eq!(Decision::ResolvedSeller.settlement(), SettlementOutcome::PaySeller);
        let json = serde_json::to_string(&Decision::ResolvedSeller).unwrap();
        assert_eq!(json, "\"resolved_seller\"");
    }
}
