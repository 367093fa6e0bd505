//! # Audit Error Types

use std::path::PathBuf;

use campus_core::{AgentId, MediaId, TaskId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sections of the audit form. Validation failures name one so the client can
/// route the agent back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSection {
    /// Check-in location.
    Location,
    /// Amenity confirmations.
    Amenities,
    /// Rent quote and period.
    Rent,
    /// Manager authority.
    Manager,
    /// Photos and videos.
    Media,
    /// Free-text comments.
    Comments,
}

impl AuditSection {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Amenities => "amenities",
            Self::Rent => "rent",
            Self::Manager => "manager",
            Self::Media => "media",
            Self::Comments => "comments",
        }
    }
}

impl std::fmt::Display for AuditSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed submission requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Where the problem is.
    pub section: AuditSection,
    /// What is wrong.
    pub message: String,
}

/// Errors from a [`DraftStore`](crate::DraftStore).
#[derive(Error, Debug)]
pub enum DraftStoreError {
    /// Filesystem failure.
    #[error("draft store I/O error at {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A persisted draft could not be decoded.
    #[error("corrupt draft at {path}: {source}")]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// Decode error.
        source: serde_json::Error,
    },

    /// A draft could not be encoded.
    #[error("failed to encode draft: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from a [`ReportSubmitter`](crate::ReportSubmitter).
#[derive(Error, Debug, Clone)]
pub enum SubmitterError {
    /// Network failure or 5xx; the submission may be retried.
    #[error("report intake unavailable: {reason}")]
    Unavailable {
        /// Detail.
        reason: String,
    },

    /// The server refused the report.
    #[error("report rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Verification task lifecycle violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Not a legal transition from the current status.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Task.
        task_id: TaskId,
        /// Current status.
        from: String,
        /// Attempted status.
        to: String,
    },

    /// The acting agent is not the assignee.
    #[error("task {task_id} is not assigned to {agent_id}")]
    NotAssigned {
        /// Task.
        task_id: TaskId,
        /// Acting agent.
        agent_id: AgentId,
    },
}

/// Errors from [`AuditService`](crate::AuditService) operations.
#[derive(Error, Debug)]
pub enum AuditError {
    /// The agent has no draft in progress.
    #[error("no active draft for {agent_id}")]
    NoActiveDraft {
        /// Agent.
        agent_id: AgentId,
    },

    /// The check-in is for another task or agent.
    #[error("check-in for {check_in_task} does not authorize an audit of {task_id}")]
    CheckInMismatch {
        /// Task being audited.
        task_id: TaskId,
        /// Task the check-in proves presence at.
        check_in_task: TaskId,
    },

    /// No media item with that id.
    #[error("media {media_id} not found in draft")]
    MediaNotFound {
        /// Media id.
        media_id: MediaId,
    },

    /// A media item with that id is already attached.
    #[error("media {media_id} already attached")]
    DuplicateMedia {
        /// Media id.
        media_id: MediaId,
    },

    /// No amenity with that id on the task.
    #[error("amenity {amenity_id} is not listed for this property")]
    AmenityNotFound {
        /// Amenity id.
        amenity_id: String,
    },

    /// Submission is missing required evidence.
    #[error("validation failed in {section}: {reason}")]
    Validation {
        /// First failing section in form order.
        section: AuditSection,
        /// Message for that section.
        reason: String,
        /// Every failing requirement.
        issues: Vec<ValidationIssue>,
    },

    /// Task lifecycle violation.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Draft persistence failure.
    #[error(transparent)]
    Store(#[from] DraftStoreError),

    /// Submission transport failure. The draft is retained.
    #[error("submission failed: {0}")]
    Submit(#[from] SubmitterError),

    /// Digest computation failure.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] campus_core::CanonicalizationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_section() {
        let err = AuditError::Validation {
            section: AuditSection::Media,
            reason: "at least 2 media items required, got 1".into(),
            issues: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("media"));
        assert!(msg.contains("got 1"));
    }

    #[test]
    fn section_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&AuditSection::Rent).unwrap(), "\"rent\"");
    }

    #[test]
    fn store_io_display_includes_path() {
        let err = DraftStoreError::Io {
            path: PathBuf::from("/var/drafts/a.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/var/drafts/a.json"));
    }
}
