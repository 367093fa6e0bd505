//! # campus-arbitration — Dispute Adjudication
//!
//! A dispute is raised against an escrowed order, optionally scored by an
//! external evidence scorer, and resolved by an administrator. The score is
//! advisory: [`AdvisoryBand`] never resolves anything on its own.
//!
//! ```text
//! PENDING ──resolve_dispute(ResolvedBuyer)──▶ RESOLVED_BUYER
//!    └─────resolve_dispute(ResolvedSeller)──▶ RESOLVED_SELLER
//! ```
//!
//! Resolution settles the order through
//! [`EscrowLedger::settle_dispute`](campus_escrow::EscrowLedger::settle_dispute)
//! while holding the dispute's lock, so a dispute and its order move to their
//! terminal states together. There is no reopening.

pub mod dispute;
pub mod engine;
pub mod error;
pub mod scorer;

pub use dispute::{Decision, Dispute, DisputeStatus, DisputeTransition, EvidenceScore};
pub use engine::{DisputeAdjudicationEngine, RaiseDispute, ScoredDispute};
pub use error::{AdjudicationError, ScorerError};
pub use scorer::{
    AdvisoryBand, EvidenceScorer, MockEvidenceScorer, ScoreReport, ScoreRequest,
};
