//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{subject_id}:{secret}   role-scoped caller
//! Bearer {secret}                       treated as admin
//! ```
//!
//! `subject_id` is the caller's owner id (buyer, seller) or agent id. It
//! may be empty for admin tokens.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use campus_core::{AgentId, OwnerId};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Role ────────────────────────────────────────────────────────────────────

/// Roles on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Pays into escrow, confirms receipt, raises disputes.
    Buyer,
    /// Receives released funds.
    Seller,
    /// Field agent: proximity check-ins and audits.
    Agent,
    /// Resolves disputes, forces release, manages tasks.
    Admin,
}

impl Role {
    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Agent => "agent",
            Self::Admin => "admin",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "buyer" => Some(Self::Buyer),
            "seller" => Some(Self::Seller),
            "agent" => Some(Self::Agent),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The caller's role.
    pub role: Role,
    /// Owner or agent id the token is bound to. `None` for admin tokens.
    pub subject: Option<Uuid>,
}

impl CallerIdentity {
    /// An unbound admin identity.
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            subject: None,
        }
    }

    /// Whether the caller is an admin.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The subject as a wallet/order owner.
    pub fn owner_id(&self) -> Option<OwnerId> {
        self.subject.map(OwnerId::from_uuid)
    }

    /// The subject as a field agent, if the caller is an agent.
    pub fn agent_id(&self) -> Option<AgentId> {
        match self.role {
            Role::Agent => self.subject.map(AgentId::from_uuid),
            _ => None,
        }
    }

    /// The bound agent id, or 403.
    pub fn require_agent(&self) -> Result<AgentId, AppError> {
        self.agent_id().ok_or_else(|| {
            AppError::Forbidden(format!(
                "an agent token is required, caller has '{}'",
                self.role.as_str()
            ))
        })
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller holds one of `allowed`. Admin always passes.
pub fn require_role(caller: &CallerIdentity, allowed: &[Role]) -> Result<(), AppError> {
    if caller.is_admin() || allowed.contains(&caller.role) {
        return Ok(());
    }
    let names: Vec<&str> = allowed.iter().map(Role::as_str).collect();
    Err(AppError::Forbidden(format!(
        "one of [{}] required, caller has '{}'",
        names.join(", "),
        caller.role.as_str()
    )))
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer tokens.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{role}:{subject_id}:{secret}` or a bare `{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    match parts.as_slice() {
        [secret] => {
            if constant_time_token_eq(secret, expected_secret) {
                Ok(CallerIdentity::admin())
            } else {
                Err("invalid bearer token".into())
            }
        }
        [role_str, subject_str, secret] => {
            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }
            let role = Role::parse(role_str).ok_or_else(|| format!("unknown role: {role_str}"))?;
            let subject = if subject_str.is_empty() {
                None
            } else {
                Some(
                    subject_str
                        .parse::<Uuid>()
                        .map_err(|e| format!("invalid subject id: {e}"))?,
                )
            };
            if subject.is_none() && role != Role::Admin {
                return Err(format!("role '{}' requires a subject id", role.as_str()));
            }
            Ok(CallerIdentity { role, subject })
        }
        _ => Err("invalid token format, expected {role}:{subject_id}:{secret} or {secret}".into()),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the bearer token and inject the [`CallerIdentity`].
///
/// When `AuthConfig.token` is `None`, every request runs as admin.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header.map(|h| h.strip_prefix("Bearer ")) {
                Some(Some(provided)) => match parse_bearer_token(provided, expected) {
                    Ok(identity) => {
                        request.extensions_mut().insert(identity);
                        next.run(request).await
                    }
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        unauthorized_response(&msg)
                    }
                },
                Some(None) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            request.extensions_mut().insert(CallerIdentity::admin());
            next.run(request).await
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(token: Option<String>) -> Router {
        let auth_config = AuthConfig { token };
        Router::new()
            .route(
                "/test",
                get(|caller: CallerIdentity| async move { caller.role.as_str() }),
            )
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(auth_config))
    }

    async fn call(app: Router, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        let resp = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn bare_secret_is_admin() {
        let (status, body) = call(test_app(Some("s3cret".into())), Some("Bearer s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin");
    }

    #[tokio::test]
    async fn scoped_token_carries_role() {
        let token = format!("Bearer buyer:{}:s3cret", Uuid::new_v4());
        let (status, body) = call(test_app(Some("s3cret".into())), Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "buyer");
    }

    #[tokio::test]
    async fn missing_authorization_header_rejected() {
        let (status, body) = call(test_app(Some("s3cret".into())), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("missing authorization header"));
    }

    #[tokio::test]
    async fn invalid_token_rejected() {
        let (status, _) = call(test_app(Some("s3cret".into())), Some("Bearer nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_rejected() {
        let (status, body) = call(test_app(Some("s3cret".into())), Some("Basic s3cret")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Bearer"));
    }

    #[tokio::test]
    async fn auth_disabled_runs_as_admin() {
        let (status, body) = call(test_app(None), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin");
    }

    #[test]
    fn constant_time_eq_rejects_prefix_and_empty() {
        assert!(constant_time_token_eq("abc", "abc"));
        assert!(!constant_time_token_eq("ab", "abc"));
        assert!(!constant_time_token_eq("", "abc"));
    }

    #[test]
    fn parse_rejects_unknown_role() {
        let err = parse_bearer_token(&format!("landlord:{}:s", Uuid::new_v4()), "s").unwrap_err();
        assert!(err.contains("unknown role"));
    }

    #[test]
    fn parse_rejects_unbound_non_admin() {
        let err = parse_bearer_token("agent::s", "s").unwrap_err();
        assert!(err.contains("requires a subject id"));
        assert_eq!(parse_bearer_token("admin::s", "s").unwrap(), CallerIdentity::admin());
    }

    #[test]
    fn parse_rejects_two_part_token() {
        assert!(parse_bearer_token("buyer:s", "s").is_err());
    }

    #[test]
    fn agent_id_only_for_agents() {
        let id = Uuid::new_v4();
        let agent = CallerIdentity {
            role: Role::Agent,
            subject: Some(id),
        };
        let buyer = CallerIdentity {
            role: Role::Buyer,
            subject: Some(id),
        };
        assert_eq!(agent.agent_id(), Some(AgentId::from_uuid(id)));
        assert!(buyer.agent_id().is_none());
        assert!(buyer.require_agent().is_err());
    }

    #[test]
    fn require_role_admin_always_passes() {
        assert!(require_role(&CallerIdentity::admin(), &[Role::Agent]).is_ok());
        let seller = CallerIdentity {
            role: Role::Seller,
            subject: Some(Uuid::new_v4()),
        };
        assert!(require_role(&seller, &[Role::Buyer, Role::Seller]).is_ok());
        assert!(matches!(
            require_role(&seller, &[Role::Agent]),
            Err(AppError::Forbidden(_))
        ));
    }
}
