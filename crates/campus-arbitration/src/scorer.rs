//! # Evidence Scoring
//!
//! The scorer compares buyer evidence against the listing and returns a
//! 0–100 match score. Scores map to advisory bands for the administrator.

use std::collections::VecDeque;

use async_trait::async_trait;
use campus_core::{DisputeId, OrderId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::dispute::{Decision, Dispute};
use crate::error::ScorerError;

/// Advisory reading of a match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryBand {
    /// 90 and above: evidence matches the listing.
    GoodMatch,
    /// 70 to 89.
    PartialMatch,
    /// Below 70.
    Mismatch,
}

impl AdvisoryBand {
    /// Band for a score.
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::GoodMatch,
            70..=89 => Self::PartialMatch,
            _ => Self::Mismatch,
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoodMatch => "good_match",
            Self::PartialMatch => "partial_match",
            Self::Mismatch => "mismatch",
        }
    }

    /// The decision this band leans toward, shown to the administrator only.
    pub fn leans_toward(&self) -> Option<Decision> {
        match self {
            Self::GoodMatch => Some(Decision::ResolvedSeller),
            Self::PartialMatch => None,
            Self::Mismatch => Some(Decision::ResolvedBuyer),
        }
    }
}

/// What the scorer is asked to assess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Dispute being scored.
    pub dispute_id: DisputeId,
    /// Disputed order.
    pub order_id: OrderId,
    /// Buyer's reason.
    pub reason: String,
    /// Buyer evidence URLs.
    pub evidence: Vec<String>,
}

impl From<&Dispute> for ScoreRequest {
    fn from(d: &Dispute) -> Self {
        Self {
            dispute_id: d.id,
            order_id: d.order_id,
            reason: d.reason.clone(),
            evidence: d.buyer_evidence.clone(),
        }
    }
}

/// Raw scorer response. The score is validated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Match score as returned.
    pub score: i64,
    /// Free-text summary.
    pub summary: String,
}

/// External evidence scorer.
#[async_trait]
pub trait EvidenceScorer: Send + Sync {
    /// Score the dispute's evidence.
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreReport, ScorerError>;
}

/// Scripted scorer for tests and local runs.
#[derive(Debug, Default)]
pub struct MockEvidenceScorer {
    responses: Mutex<VecDeque<Result<ScoreReport, ScorerError>>>,
    requests: Mutex<Vec<ScoreRequest>>,
}

impl MockEvidenceScorer {
    /// A scorer with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful score.
    pub fn push_score(&self, score: i64, summary: &str) {
        self.responses.lock().push_back(Ok(ScoreReport {
            score,
            summary: summary.to_string(),
        }));
    }

    /// Queue a failure.
    pub fn push_error(&self, err: ScorerError) {
        self.responses.lock().push_back(Err(err));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ScoreRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl EvidenceScorer for MockEvidenceScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreReport, ScorerError> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ScorerError::Unavailable {
                    reason: "no scripted response".into(),
                })
            })
    }
}
