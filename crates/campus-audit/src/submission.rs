//! # Report Submission
//!
//! [`VerificationReportSubmission`] is the immutable payload sent to the server.
//! It can only be built from a draft that passes validation, and it carries a
//! SHA-256 digest of its canonical form so the server's acknowledgment can be
//! matched to exactly what was sent.

use std::collections::VecDeque;

use async_trait::async_trait;
use campus_core::{
    sha256_digest, AgentId, Amount, CanonicalBytes, ContentDigest, GeoPoint, MicroDegrees, TaskId,
    Timestamp,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuditError, AuditSection, SubmitterError, ValidationIssue};
use crate::report::{FieldAuditReport, RentPeriod};

/// One amenity's confirmation in the submitted report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmenityConfirmation {
    /// Amenity identifier.
    pub id: String,
    /// Whether it was seen on site.
    pub confirmed: bool,
}

/// A validated, immutable audit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReportSubmission {
    /// Task verified.
    pub task_id: TaskId,
    /// Agent who verified it.
    pub agent_id: AgentId,
    /// Check-in time.
    pub visited_at: Timestamp,
    /// Check-in coordinate.
    pub check_in_geom: GeoPoint,
    /// Amenity confirmations.
    pub amenities_confirmed: Vec<AmenityConfirmation>,
    /// Whether the on-site quote matches the listing.
    pub is_rent_match: bool,
    /// On-site rent quote, positive.
    pub physical_rent_quote: Amount,
    /// Quote period.
    pub rent_period: RentPeriod,
    /// Whether the manager's authority checked out.
    pub is_manager_valid: bool,
    /// Notes on the manager check.
    pub manager_notes: String,
    /// Uploaded media URLs.
    pub media_urls: Vec<String>,
    /// Suggested points of interest.
    pub poi_suggestions: Vec<String>,
    /// General comments.
    pub comments: String,
    /// Draft revision this was built from.
    pub draft_revision: u64,
    /// SHA-256 over the canonical form of every field above.
    pub digest: ContentDigest,
}

/// The digested view: floats replaced by micro-degrees, digest excluded.
#[derive(Serialize)]
struct CanonicalView<'a> {
    task_id: &'a TaskId,
    agent_id: &'a AgentId,
    visited_at: &'a Timestamp,
    check_in_geom: MicroDegrees,
    amenities_confirmed: &'a [AmenityConfirmation],
    is_rent_match: bool,
    physical_rent_quote: i64,
    rent_period: RentPeriod,
    is_manager_valid: bool,
    manager_notes: &'a str,
    media_urls: &'a [String],
    poi_suggestions: &'a [String],
    comments: &'a str,
    draft_revision: u64,
}

/// Check the draft against submission requirements. Issues are listed in form order.
pub fn validate_draft(draft: &FieldAuditReport, min_media: usize) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if draft.check_in_geom.validate().is_err() {
        issues.push(ValidationIssue {
            section: AuditSection::Location,
            message: "check-in coordinate is invalid".into(),
        });
    }
    match draft.physical_rent_quote {
        Some(q) if !q.is_zero() => {}
        _ => issues.push(ValidationIssue {
            section: AuditSection::Rent,
            message: "physical rent quote must be greater than zero".into(),
        }),
    }
    if draft.media.len() < min_media {
        issues.push(ValidationIssue {
            section: AuditSection::Media,
            message: format!(
                "at least {min_media} media items required, got {}",
                draft.media.len()
            ),
        });
    }
    issues
}

impl VerificationReportSubmission {
    /// Validate `draft` and freeze it into a submission.
    ///
    /// # Errors
    ///
    /// [`AuditError::Validation`] naming the first failing section.
    pub fn from_draft(draft: &FieldAuditReport, min_media: usize) -> Result<Self, AuditError> {
        let issues = validate_draft(draft, min_media);
        if let Some(first) = issues.first() {
            return Err(AuditError::Validation {
                section: first.section,
                reason: first.message.clone(),
                issues,
            });
        }
        let physical_rent_quote = draft.physical_rent_quote.unwrap_or(Amount::ZERO);
        let amenities_confirmed: Vec<_> = draft
            .amenities
            .iter()
            .map(|a| AmenityConfirmation {
                id: a.id.clone(),
                confirmed: a.confirmed,
            })
            .collect();
        let media_urls: Vec<_> = draft.media.iter().map(|m| m.url.clone()).collect();

        let view = CanonicalView {
            task_id: &draft.task_id,
            agent_id: &draft.agent_id,
            visited_at: &draft.visited_at,
            check_in_geom: draft.check_in_geom.to_micro(),
            amenities_confirmed: &amenities_confirmed,
            is_rent_match: draft.is_rent_match.unwrap_or(false),
            physical_rent_quote: physical_rent_quote.minor_units(),
            rent_period: draft.rent_period,
            is_manager_valid: draft.is_manager_valid.unwrap_or(false),
            manager_notes: &draft.manager_notes,
            media_urls: &media_urls,
            poi_suggestions: &draft.poi_suggestions,
            comments: &draft.comments,
            draft_revision: draft.revision,
        };
        let digest = sha256_digest(&CanonicalBytes::new(&view)?);

        Ok(Self {
            task_id: draft.task_id,
            agent_id: draft.agent_id,
            visited_at: draft.visited_at,
            check_in_geom: draft.check_in_geom,
            amenities_confirmed,
            is_rent_match: draft.is_rent_match.unwrap_or(false),
            physical_rent_quote,
            rent_period: draft.rent_period,
            is_manager_valid: draft.is_manager_valid.unwrap_or(false),
            manager_notes: draft.manager_notes.clone(),
            media_urls,
            poi_suggestions: draft.poi_suggestions.clone(),
            comments: draft.comments.clone(),
            draft_revision: draft.revision,
            digest,
        })
    }
}

/// Server acknowledgment of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Server-assigned report id.
    pub report_id: Uuid,
    /// Task the report is for.
    pub task_id: TaskId,
    /// Hex digest the server computed or echoed.
    pub digest: String,
    /// When the server accepted it.
    pub accepted_at: Timestamp,
}

/// The server endpoint that accepts verification reports.
#[async_trait]
pub trait ReportSubmitter: Send + Sync {
    /// Send the report. Must be idempotent on `report.digest`.
    async fn submit(&self, report: &VerificationReportSubmission) -> Result<SubmissionReceipt, SubmitterError>;
}

/// Submitter that fails a configurable number of times, then accepts.
#[derive(Debug, Default)]
pub struct MockReportSubmitter {
    failures: Mutex<VecDeque<SubmitterError>>,
    accepted: Mutex<Vec<VerificationReportSubmission>>,
}

impl MockReportSubmitter {
    /// Accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `err` on the next call.
    pub fn fail_next(&self, err: SubmitterError) {
        self.failures.lock().push_back(err);
    }

    /// Reports accepted so far.
    pub fn accepted(&self) -> Vec<VerificationReportSubmission> {
        self.accepted.lock().clone()
    }
}

#[async_trait]
impl ReportSubmitter for MockReportSubmitter {
    async fn submit(&self, report: &VerificationReportSubmission) -> Result<SubmissionReceipt, SubmitterError> {
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        self.accepted.lock().push(report.clone());
        Ok(SubmissionReceipt {
            report_id: Uuid::new_v4(),
            task_id: report.task_id,
            digest: report.digest.to_hex(),
            accepted_at: Timestamp::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{AmenityCheck, MediaItem, MediaKind};
    use campus_core::MediaId;

    fn photo(n: u32) -> MediaItem {
        MediaItem {
            id: MediaId::new(),
            url: format!("https://cdn.example/{n}.jpg"),
            kind: MediaKind::Photo,
            captured_at: Timestamp::now(),
        }
    }

    fn draft(photos: u32, rent: i64) -> FieldAuditReport {
        FieldAuditReport {
            task_id: TaskId::new(),
            agent_id: AgentId::new(),
            check_in_geom: GeoPoint::new(6.5244, 3.3792).unwrap(),
            visited_at: Timestamp::now(),
            degraded_check_in: false,
            amenities: vec![AmenityCheck {
                id: "borehole".into(),
                label: "Borehole".into(),
                confirmed: true,
            }],
            physical_rent_quote: Some(Amount::new(rent).unwrap()),
            rent_period: RentPeriod::Yearly,
            is_rent_match: Some(true),
            is_manager_valid: Some(true),
            manager_notes: String::new(),
            media: (0..photos).map(photo).collect(),
            poi_suggestions: vec![],
            comments: "clean".into(),
            last_saved_at: Timestamp::now(),
            revision: 7,
        }
    }

    #[test]
    fn one_photo_and_zero_rent_fails_on_both_sections() {
        let err = VerificationReportSubmission::from_draft(&draft(1, 0), 2).unwrap_err();
        let AuditError::Validation { section, issues, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(section, AuditSection::Rent);
        let sections: Vec<_> = issues.iter().map(|i| i.section).collect();
        assert_eq!(sections, vec![AuditSection::Rent, AuditSection::Media]);
    }

    #[test]
    fn missing_media_alone_names_media() {
        let err = VerificationReportSubmission::from_draft(&draft(1, 150_000), 2).unwrap_err();
        assert!(matches!(
            err,
            AuditError::Validation {
                section: AuditSection::Media,
                ..
            }
        ));
    }

    #[test]
    fn two_photos_and_positive_rent_passes() {
        let d = draft(2, 150_000);
        let s = VerificationReportSubmission::from_draft(&d, 2).unwrap();
        assert_eq!(s.media_urls.len(), 2);
        assert_eq!(s.physical_rent_quote.minor_units(), 150_000);
        assert_eq!(s.draft_revision, 7);
        assert_eq!(s.amenities_confirmed[0].id, "borehole");
    }

    #[test]
    fn digest_is_stable_and_content_sensitive() {
        let d = draft(2, 150_000);
        let a = VerificationReportSubmission::from_draft(&d, 2).unwrap();
        let b = VerificationReportSubmission::from_draft(&d, 2).unwrap();
        assert_eq!(a.digest, b.digest);

        let mut changed = d.clone();
        changed.comments = "leaking roof".into();
        let c = VerificationReportSubmission::from_draft(&changed, 2).unwrap();
        assert_ne!(a.digest, c.digest);
    }

    #[tokio::test]
    async fn mock_submitter_fails_then_accepts() {
        let submitter = MockReportSubmitter::new();
        submitter.fail_next(SubmitterError::Unavailable {
            reason: "offline".into(),
        });
        let s = VerificationReportSubmission::from_draft(&draft(2, 1), 2).unwrap();
        assert!(submitter.submit(&s).await.is_err());
        let receipt = submitter.submit(&s).await.unwrap();
        assert_eq!(receipt.digest, s.digest.to_hex());
        assert_eq!(submitter.accepted().len(), 1);
    }
}
