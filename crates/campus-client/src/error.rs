//! Collaborator client error types.

use campus_arbitration::ScorerError;
use campus_audit::SubmitterError;

/// Errors from collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        /// Operation, e.g. `POST /v1/score`.
        endpoint: String,
        /// Transport failure.
        source: reqwest::Error,
    },
    /// The collaborator returned a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        /// Operation.
        endpoint: String,
        /// Status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        /// Operation.
        endpoint: String,
        /// Decode failure.
        source: reqwest::Error,
    },
    /// Request rejected before sending.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong.
        reason: String,
    },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl From<ClientError> for ScorerError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api { status, body, .. } => ScorerError::Rejected { status, body },
            other => ScorerError::Unavailable {
                reason: other.to_string(),
            },
        }
    }
}

impl From<ClientError> for SubmitterError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api { status, body, .. } if status < 500 => {
                SubmitterError::Rejected { status, body }
            }
            other => SubmitterError::Unavailable {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_stay_retryable_for_submissions() {
        let err = ClientError::Api {
            endpoint: "POST /v1/reports".into(),
            status: 503,
            body: "down".into(),
        };
        assert!(matches!(
            SubmitterError::from(err),
            SubmitterError::Unavailable { .. }
        ));
        let err = ClientError::Api {
            endpoint: "POST /v1/reports".into(),
            status: 422,
            body: "bad".into(),
        };
        assert!(matches!(
            SubmitterError::from(err),
            SubmitterError::Rejected { status: 422, .. }
        ));
    }
}
