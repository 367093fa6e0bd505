//! # Adjudication Engine
//!
//! Owns every dispute. Each dispute sits behind its own mutex; resolution
//! takes that mutex, then the ledger's order lock inside
//! [`EscrowLedger::settle_dispute`]. Scoring never holds a lock across the
//! scorer call.

use std::collections::HashMap;
use std::sync::Arc;

use campus_core::{DisputeId, OrderId, TaskId, Timestamp};
use campus_escrow::{DisputeClaim, EscrowLedger};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::dispute::{Decision, Dispute, DisputeStatus};
use crate::error::AdjudicationError;
use crate::scorer::{AdvisoryBand, EvidenceScorer, ScoreRequest};

/// Input for [`DisputeAdjudicationEngine::raise_dispute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaiseDispute {
    /// Order to dispute.
    pub order_id: OrderId,
    /// Order version the buyer last read.
    pub expected_version: u64,
    /// Buyer's reason.
    pub reason: String,
    /// Evidence URLs.
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Verification task to re-open, if the dispute concerns a verified listing.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    /// Client-chosen id; retries with the same id return the same dispute.
    #[serde(default)]
    pub dispute_id: Option<DisputeId>,
}

/// A dispute with its advisory band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredDispute {
    /// The dispute.
    pub dispute: Dispute,
    /// Band for the stored score.
    pub band: AdvisoryBand,
}

/// The dispute adjudication engine.
pub struct DisputeAdjudicationEngine {
    ledger: Arc<EscrowLedger>,
    scorer: Arc<dyn EvidenceScorer>,
    disputes: RwLock<HashMap<DisputeId, Arc<Mutex<Dispute>>>>,
}

impl std::fmt::Debug for DisputeAdjudicationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisputeAdjudicationEngine")
            .field("disputes", &self.disputes.read().len())
            .finish_non_exhaustive()
    }
}

impl DisputeAdjudicationEngine {
    /// Create an engine settling through `ledger`.
    pub fn new(ledger: Arc<EscrowLedger>, scorer: Arc<dyn EvidenceScorer>) -> Self {
        Self {
            ledger,
            scorer,
            disputes: RwLock::new(HashMap::new()),
        }
    }

    /// The ledger disputes settle through.
    pub fn ledger(&self) -> &Arc<EscrowLedger> {
        &self.ledger
    }

    fn handle(&self, dispute_id: DisputeId) -> Result<Arc<Mutex<Dispute>>, AdjudicationError> {
        self.disputes
            .read()
            .get(&dispute_id)
            .cloned()
            .ok_or(AdjudicationError::NotFound { dispute_id })
    }

    /// Snapshot of a dispute.
    pub fn dispute(&self, dispute_id: DisputeId) -> Result<Dispute, AdjudicationError> {
        Ok(self.handle(dispute_id)?.lock().clone())
    }

    /// Disputes raised against `order_id`, oldest first.
    pub fn disputes_for_order(&self, order_id: OrderId) -> Vec<Dispute> {
        let handles: Vec<_> = self.disputes.read().values().cloned().collect();
        let mut out: Vec<Dispute> = handles
            .iter()
            .map(|h| h.lock().clone())
            .filter(|d| d.order_id == order_id)
            .collect();
        out.sort_by_key(|d| d.raised_at);
        out
    }

    /// Freeze the order and open a pending dispute.
    pub fn raise_dispute(&self, request: RaiseDispute) -> Result<Dispute, AdjudicationError> {
        if let Some(existing) = request.dispute_id.and_then(|id| self.dispute(id).ok()) {
            if existing.order_id != request.order_id {
                return Err(AdjudicationError::OrderMismatch {
                    dispute_id: existing.id,
                    requested: request.order_id,
                    actual: existing.order_id,
                });
            }
            return Ok(existing);
        }

        let dispute_id = request.dispute_id.unwrap_or_default();
        let outcome = self.ledger.raise_dispute(
            request.order_id,
            request.expected_version,
            DisputeClaim {
                dispute_id,
                reason: request.reason.clone(),
                evidence: request.evidence.clone(),
            },
        )?;
        let order = outcome.order;
        let dispute = Dispute {
            id: dispute_id,
            order_id: order.id,
            task_id: request.task_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            reason: request.reason,
            buyer_evidence: request.evidence,
            status: DisputeStatus::Pending,
            ai_match: None,
            admin_notes: None,
            admin_decision: None,
            raised_at: Timestamp::now(),
            resolved_at: None,
            transition_log: Vec::new(),
        };
        let stored = self
            .disputes
            .write()
            .entry(dispute_id)
            .or_insert_with(|| Arc::new(Mutex::new(dispute)))
            .lock()
            .clone();
        tracing::info!(dispute_id = %dispute_id, order_id = %order.id, "dispute raised");
        Ok(stored)
    }

    /// Ask the scorer for an advisory match score and store it.
    ///
    /// The dispute status is never changed here.
    pub async fn score_dispute(
        &self,
        dispute_id: DisputeId,
    ) -> Result<ScoredDispute, AdjudicationError> {
        let handle = self.handle(dispute_id)?;
        let request = {
            let d = handle.lock();
            if d.status.is_terminal() {
                return Err(AdjudicationError::NotPending {
                    dispute_id,
                    status: d.status.as_str().to_string(),
                    operation: "score_dispute",
                });
            }
            ScoreRequest::from(&*d)
        };

        let report = self.scorer.score(&request).await?;
        let score = u8::try_from(report.score)
            .ok()
            .filter(|s| *s <= 100)
            .ok_or(AdjudicationError::InvalidScore {
                score: report.score,
            })?;

        let mut d = handle.lock();
        d.record_score(score, report.summary)?;
        let band = AdvisoryBand::from_score(score);
        tracing::info!(%dispute_id, score, band = band.as_str(), "dispute scored");
        Ok(ScoredDispute {
            dispute: d.clone(),
            band,
        })
    }

    /// Apply an administrator's decision.
    ///
    /// Settles the order, then marks the dispute terminal. Repeating the same
    /// decision returns the resolved dispute without settling again. A new
    /// decision needs non-blank `admin_notes`.
    pub fn resolve_dispute(
        &self,
        dispute_id: DisputeId,
        decision: Decision,
        admin_notes: String,
    ) -> Result<Dispute, AdjudicationError> {
        let handle = self.handle(dispute_id)?;
        let mut d = handle.lock();
        if d.status == decision.status() {
            return Ok(d.clone());
        }
        if d.status.is_terminal() {
            return Err(AdjudicationError::Conflict {
                dispute_id,
                current: d.status.as_str().to_string(),
                attempted: decision.as_str().to_string(),
            });
        }
        if admin_notes.trim().is_empty() {
            return Err(AdjudicationError::MissingNotes { dispute_id });
        }

        self.ledger
            .settle_dispute(d.order_id, dispute_id, decision.settlement())?;
        d.resolve(decision, admin_notes)?;
        tracing::info!(
            %dispute_id,
            order_id = %d.order_id,
            decision = decision.as_str(),
            score = ?d.ai_match.as_ref().map(|m| m.score),
            "dispute resolved"
        );
        Ok(d.clone())
    }
}
