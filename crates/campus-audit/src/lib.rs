//! # campus-audit — Field Audit Aggregate
//!
//! A field agent's in-person verification of a property, drafted locally and
//! submitted once complete.
//!
//! - A draft can only be started from a [`campus_geo::CheckIn`].
//! - Each agent has at most one active draft; starting another overwrites it.
//! - Every mutation bumps `last_saved_at` and persists through a [`DraftStore`],
//!   so drafts survive restarts and connectivity loss.
//! - [`AuditService::submit`] validates, produces an immutable
//!   [`VerificationReportSubmission`], and clears the draft only after the
//!   server acknowledges it.

pub mod error;
pub mod reconcile;
pub mod report;
pub mod service;
pub mod store;
pub mod submission;
pub mod task;

pub use error::{AuditError, AuditSection, DraftStoreError, SubmitterError, TaskError, ValidationIssue};
pub use reconcile::{reconcile, Reconciliation, ServerView};
pub use report::{Amenity, AmenityCheck, DraftPatch, FieldAuditReport, MediaItem, MediaKind, RentPeriod};
pub use service::{AuditConfig, AuditService};
pub use store::{DraftStore, FileDraftStore, MemoryDraftStore};
pub use submission::{
    AmenityConfirmation, MockReportSubmitter, ReportSubmitter, SubmissionReceipt,
    VerificationReportSubmission,
};
pub use task::{TaskPriority, TaskStatus, TaskTransition, VerificationTask};
