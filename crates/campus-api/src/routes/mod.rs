//! # API Route Modules
//!
//! - `orders`: escrow order lifecycle (create, capture, fulfil, release, raise dispute).
//! - `disputes`: dispute view, advisory evidence scoring, admin resolution.
//! - `wallets`: balance queries.
//! - `tasks`: verification task registration and assignment.
//! - `proximity`: proximity gate sessions and relayed position fixes.
//! - `audits`: field audit drafts and submission.
//! - `bank`: display-only bank-account name lookup.

pub mod audits;
pub mod bank;
pub mod disputes;
pub mod orders;
pub mod proximity;
pub mod tasks;
pub mod wallets;

use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;

/// Fail unless the caller is admin or bound to one of `parties`.
pub(crate) fn require_party(caller: &CallerIdentity, parties: &[Uuid]) -> Result<(), AppError> {
    if caller.is_admin() {
        return Ok(());
    }
    match caller.subject {
        Some(subject) if parties.contains(&subject) => Ok(()),
        _ => Err(AppError::Forbidden(
            "caller is not a party to this resource".into(),
        )),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Router harness shared by route tests.

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use campus_arbitration::MockEvidenceScorer;
    use campus_audit::{MemoryDraftStore, MockReportSubmitter};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::bootstrap::EngineConfig;
    use crate::state::{AppConfig, AppState, Collaborators};

    pub const SECRET: &str = "test-secret";

    /// State with mock collaborators, plus handles to drive them.
    pub struct Harness {
        pub state: AppState,
        pub scorer: Arc<MockEvidenceScorer>,
        pub submitter: Arc<MockReportSubmitter>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_engine(EngineConfig::default())
        }

        pub fn with_engine(engine: EngineConfig) -> Self {
            let scorer = Arc::new(MockEvidenceScorer::new());
            let submitter = Arc::new(MockReportSubmitter::new());
            let collaborators = Collaborators {
                scorer: scorer.clone(),
                submitter: submitter.clone(),
                drafts: Arc::new(MemoryDraftStore::new()),
                bank: None,
            };
            let config = AppConfig {
                port: 0,
                auth_token: Some(SECRET.into()),
            };
            let state = AppState::new(config, engine, collaborators).unwrap();
            Self {
                state,
                scorer,
                submitter,
            }
        }

        pub fn app(&self) -> Router {
            crate::app(self.state.clone())
        }
    }

    pub fn token(role: &str, subject: Uuid) -> String {
        format!("{role}:{subject}:{SECRET}")
    }

    pub fn admin() -> String {
        SECRET.to_string()
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"));
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }
}
