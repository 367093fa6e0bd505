//! # Adjudication Error Types

use campus_core::{CanonicalizationError, DisputeId, OrderId};
use campus_escrow::EscrowError;
use thiserror::Error;

/// Failure reported by an [`EvidenceScorer`](crate::EvidenceScorer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScorerError {
    /// The scorer could not be reached.
    #[error("evidence scorer unavailable: {reason}")]
    Unavailable {
        /// Transport detail.
        reason: String,
    },

    /// The scorer refused the request.
    #[error("evidence scorer rejected request ({status}): {body}")]
    Rejected {
        /// Status code returned.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Errors from the adjudication engine.
#[derive(Error, Debug)]
pub enum AdjudicationError {
    /// No such dispute.
    #[error("{dispute_id} not found")]
    NotFound {
        /// The dispute identifier.
        dispute_id: DisputeId,
    },

    /// The dispute is already resolved with a different decision.
    #[error("{dispute_id} is already {current}; cannot resolve as {attempted}")]
    Conflict {
        /// The dispute identifier.
        dispute_id: DisputeId,
        /// Current terminal status.
        current: String,
        /// Requested decision.
        attempted: String,
    },

    /// The operation needs a pending dispute.
    #[error("{dispute_id} is {status}; {operation} requires a pending dispute")]
    NotPending {
        /// The dispute identifier.
        dispute_id: DisputeId,
        /// Current status.
        status: String,
        /// The attempted operation.
        operation: &'static str,
    },

    /// A dispute id supplied for an idempotent retry belongs to another order.
    #[error("{dispute_id} belongs to {actual}, not {requested}")]
    OrderMismatch {
        /// The dispute identifier.
        dispute_id: DisputeId,
        /// Order named in the request.
        requested: OrderId,
        /// Order the dispute holds.
        actual: OrderId,
    },

    /// A decision was submitted without an explanation.
    #[error("{dispute_id}: admin notes must explain the decision")]
    MissingNotes {
        /// The dispute identifier.
        dispute_id: DisputeId,
    },

    /// The scorer returned a score outside 0–100.
    #[error("evidence score {score} is outside 0-100")]
    InvalidScore {
        /// The raw score.
        score: i64,
    },

    /// The evidence scorer failed.
    #[error(transparent)]
    Scorer(#[from] ScorerError),

    /// The ledger refused the operation.
    #[error(transparent)]
    Escrow(#[from] EscrowError),

    /// Decision record could not be digested.
    #[error("decision digest: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl AdjudicationError {
    /// Whether the caller lost a race and should refetch.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::Escrow(EscrowError::Conflict { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_display_names_both_decisions() {
        let err = AdjudicationError::Conflict {
            dispute_id: DisputeId::new(),
            current: "resolved_seller".into(),
            attempted: "resolved_buyer".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("resolved_seller"));
        assert!(msg.contains("resolved_buyer"));
        assert!(err.is_conflict());
    }

    #[test]
    fn escrow_conflict_is_a_conflict() {
        let err = AdjudicationError::from(EscrowError::Conflict {
            order_id: OrderId::new(),
            expected_version: 1,
            actual_version: 2,
        });
        assert!(err.is_conflict());
        assert!(!AdjudicationError::InvalidScore { score: 101 }.is_conflict());
    }
}
