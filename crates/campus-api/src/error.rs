//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from the escrow, arbitration, audit and client crates
//! to HTTP status codes and a JSON body of the form
//! `{"error": {"code", "message", "details"}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use campus_arbitration::AdjudicationError;
use campus_audit::{AuditError, SubmitterError, TaskError};
use campus_client::ClientError;
use campus_escrow::EscrowError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "ESCROW_INVARIANT_VIOLATION").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Validation failed with per-field issues (422).
    #[error("validation error: {message}")]
    ValidationIssues {
        message: String,
        details: serde_json::Value,
    },

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient role or not a party to the resource (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Stale version or conflicting terminal state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Escrow operation illegal in the order's current status (409).
    #[error("{0}")]
    InvariantViolation(String),

    /// A collaborator is unreachable or refused the call (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) | Self::ValidationIssues { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::InvariantViolation(_) => (StatusCode::CONFLICT, "ESCROW_INVARIANT_VIOLATION"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let details = match self {
            Self::ValidationIssues { details, .. } => Some(details),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<campus_core::ValidationError> for AppError {
    fn from(err: campus_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<EscrowError> for AppError {
    fn from(err: EscrowError) -> Self {
        match &err {
            EscrowError::NotFound { .. } => Self::NotFound(err.to_string()),
            EscrowError::Conflict { .. } => Self::Conflict(err.to_string()),
            EscrowError::InvariantViolation { .. } => Self::InvariantViolation(err.to_string()),
            EscrowError::AmountMismatch { .. } | EscrowError::Validation(_) => {
                Self::Validation(err.to_string())
            }
            EscrowError::InsufficientBalance { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<AdjudicationError> for AppError {
    fn from(err: AdjudicationError) -> Self {
        match err {
            AdjudicationError::Escrow(inner) => inner.into(),
            AdjudicationError::NotFound { .. } => Self::NotFound(err.to_string()),
            AdjudicationError::MissingNotes { .. } => Self::Validation(err.to_string()),
            AdjudicationError::Conflict { .. }
            | AdjudicationError::NotPending { .. }
            | AdjudicationError::OrderMismatch { .. } => Self::Conflict(err.to_string()),
            AdjudicationError::Scorer(_) | AdjudicationError::InvalidScore { .. } => {
                Self::ServiceUnavailable(err.to_string())
            }
            AdjudicationError::Canonicalization(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<TaskError> for AppError {
    fn from(err: TaskError) -> Self {
        match &err {
            TaskError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            TaskError::NotAssigned { .. } => Self::Forbidden(err.to_string()),
        }
    }
}

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Task(inner) => inner.into(),
            AuditError::Validation { ref issues, .. } => Self::ValidationIssues {
                message: err.to_string(),
                details: serde_json::json!({ "issues": issues }),
            },
            AuditError::NoActiveDraft { .. }
            | AuditError::MediaNotFound { .. }
            | AuditError::AmenityNotFound { .. } => Self::NotFound(err.to_string()),
            AuditError::DuplicateMedia { .. } => Self::Conflict(err.to_string()),
            AuditError::CheckInMismatch { .. } => Self::Forbidden(err.to_string()),
            AuditError::Submit(SubmitterError::Rejected { status, ref body }) => {
                Self::ServiceUnavailable(format!("report intake rejected submission ({status}): {body}"))
            }
            AuditError::Submit(SubmitterError::Unavailable { .. }) => {
                Self::ServiceUnavailable(err.to_string())
            }
            AuditError::Store(_) | AuditError::Canonicalization(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match &err {
            ClientError::InvalidRequest { .. } => Self::Validation(err.to_string()),
            ClientError::Config(_) => Self::Internal(err.to_string()),
            _ => Self::ServiceUnavailable(err.to_string()),
        }
    }
}
