//! # Proximity Gate API
//!
//! The device relays position fixes; the server owns the gate. A session
//! holds one [`ProximityGate`] in `Requesting`. Fixes captured before the
//! session's `not_before` are refused as stale, so the device must read a
//! fresh position after opening (or retrying) a session. Every fix carries
//! its device capture time. A fix that arrives after the session's
//! `timeout_secs` fails the attempt with `timeout`.
//!
//! - `POST /v1/proximity/sessions`: open a session for an assigned task
//! - `POST /v1/proximity/sessions/:id/fix`: relay a fix or a provider error
//! - `DELETE /v1/proximity/sessions/:id`: cancel
//!
//! A verified fix closes the session and issues a single-use check-in id
//! for `POST /v1/audits`. `TOO_FAR` and `FAILED` keep the session open for
//! another attempt.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use campus_core::{GeoPoint, Timestamp};
use campus_geo::{GateOutcome, GeolocationError, PositionFix, ProximityGate, Requesting};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────────────

/// Open a proximity session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenSessionRequest {
    pub task_id: Uuid,
}

impl Validate for OpenSessionRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// An open session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub task_id: Uuid,
    /// Fixes captured before this instant are refused.
    #[schema(value_type = String)]
    pub not_before: Timestamp,
    pub timeout_secs: u64,
    pub threshold_meters: f64,
}

/// A relayed position fix, or the provider's error code.
///
/// Either `error` is set, or all of `lat`, `lng`, `accuracy_meters` and
/// `captured_at` are.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PositionFixRequest {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub accuracy_meters: Option<f64>,
    /// Device capture time. Required with a fix.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub captured_at: Option<Timestamp>,
    /// `permission_denied`, `position_unavailable`, `timeout` or `api_error`.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl Validate for PositionFixRequest {
    fn validate(&self) -> Result<(), String> {
        if self.error.is_some() {
            return Ok(());
        }
        match (self.lat, self.lng, self.accuracy_meters) {
            (Some(lat), Some(lng), Some(acc)) => {
                GeoPoint::new(lat, lng).map_err(|e| e.to_string())?;
                if !acc.is_finite() || acc < 0.0 {
                    return Err("accuracy_meters must be a non-negative number".into());
                }
                if self.captured_at.is_none() {
                    return Err("captured_at is required with a fix".into());
                }
                Ok(())
            }
            _ => Err("either error or lat, lng and accuracy_meters are required".into()),
        }
    }
}

impl PositionFixRequest {
    fn into_reading(self) -> Result<PositionFix, GeolocationError> {
        if let Some(code) = self.error {
            return Err(GeolocationError::from_code(
                &code,
                self.detail.unwrap_or_default(),
            ));
        }
        // Presence and range were checked in `validate`.
        let point = GeoPoint::new(self.lat.unwrap_or_default(), self.lng.unwrap_or_default())
            .map_err(|e| GeolocationError::PositionUnavailable {
                reason: e.to_string(),
            })?;
        let captured_at = self
            .captured_at
            .ok_or_else(|| GeolocationError::PositionUnavailable {
                reason: "fix has no capture time".into(),
            })?;
        Ok(PositionFix {
            point,
            accuracy_meters: self.accuracy_meters.unwrap_or_default(),
            captured_at,
        })
    }
}

/// Result of one attempt.
#[derive(Debug, Serialize, ToSchema)]
pub struct AttemptResponse {
    pub session_id: Uuid,
    /// `VERIFIED`, `TOO_FAR` or `FAILED`.
    pub state: String,
    pub within_range: bool,
    pub distance_meters: Option<f64>,
    /// The reported accuracy exceeded the degraded threshold. Advisory only.
    pub degraded_accuracy: bool,
    pub error_code: Option<String>,
    /// Single-use token for starting the audit. Present when verified.
    pub check_in_id: Option<Uuid>,
    pub attempts: u32,
    /// Window start for the next attempt, when the session stays open.
    #[schema(value_type = Option<String>)]
    pub not_before: Option<Timestamp>,
}

/// A cancelled session.
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelledResponse {
    pub session_id: Uuid,
    pub state: String,
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the proximity router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/proximity/sessions", post(open_session))
        .route("/v1/proximity/sessions/:id/fix", post(submit_fix))
        .route("/v1/proximity/sessions/:id", delete(cancel_session))
}

fn take_own_session(
    state: &AppState,
    caller: &CallerIdentity,
    id: Uuid,
) -> Result<ProximityGate<Requesting>, AppError> {
    let agent = caller.require_agent()?;
    let gate = state
        .proximity
        .take(&id)
        .ok_or_else(|| AppError::NotFound(format!("proximity session {id} not found")))?;
    if gate.agent_id != agent {
        state.proximity.park(id, gate);
        return Err(AppError::Forbidden(
            "proximity session belongs to another agent".into(),
        ));
    }
    Ok(gate)
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// POST /v1/proximity/sessions — Open a proximity check for an assigned task.
#[utoipa::path(
    post,
    path = "/v1/proximity/sessions",
    request_body = OpenSessionRequest,
    responses(
        (status = 201, description = "Session open, awaiting a fresh fix", body = SessionResponse),
        (status = 403, description = "Caller is not the assigned agent", body = crate::error::ErrorBody),
        (status = 404, description = "Task not found", body = crate::error::ErrorBody),
        (status = 409, description = "Task does not accept an audit", body = crate::error::ErrorBody),
    ),
    tag = "proximity"
)]
pub async fn open_session(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<OpenSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let agent = caller.require_agent()?;
    let req = extract_validated_json(body)?;
    let task = state
        .tasks
        .get(&req.task_id)
        .ok_or_else(|| AppError::NotFound(format!("task {} not found", req.task_id)))?;
    task.require_assignee(agent)?;
    if !task.status.accepts_audit() {
        return Err(AppError::Conflict(format!(
            "task {} is {} and does not accept an audit",
            task.id, task.status
        )));
    }

    let policy = state.engine_config.proximity;
    let gate = ProximityGate::new(task.id, agent, task.property_geom, policy).begin();
    let session_id = Uuid::new_v4();
    let not_before = gate.position_request().not_before;
    state.proximity.park(session_id, gate);
    tracing::debug!(%session_id, task_id = %task.id, %agent, "proximity session opened");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id,
            task_id: req.task_id,
            not_before,
            timeout_secs: policy.request_timeout_secs,
            threshold_meters: policy.threshold_meters,
        }),
    ))
}

/// POST /v1/proximity/sessions/{id}/fix — Resolve the session with a relayed fix.
#[utoipa::path(
    post,
    path = "/v1/proximity/sessions/{id}/fix",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = PositionFixRequest,
    responses(
        (status = 200, description = "Attempt outcome", body = AttemptResponse),
        (status = 404, description = "Session not found, closed or swept after its timeout", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed fix or missing captured_at", body = crate::error::ErrorBody),
    ),
    tag = "proximity"
)]
pub async fn submit_fix(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<PositionFixRequest>, JsonRejection>,
) -> Result<Json<AttemptResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let gate = take_own_session(&state, &caller, id)?;

    let outcome = gate.resolve_at(req.into_reading(), Timestamp::now());
    let state_name = outcome.state().as_str().to_string();
    let response = match outcome {
        GateOutcome::Verified(gate) => {
            let check_in = gate.check_in();
            let check_in_id = Uuid::new_v4();
            let response = AttemptResponse {
                session_id: id,
                state: state_name,
                within_range: true,
                distance_meters: Some(check_in.distance_meters()),
                degraded_accuracy: check_in.degraded_accuracy(),
                error_code: None,
                check_in_id: Some(check_in_id),
                attempts: gate.attempts(),
                not_before: None,
            };
            state.check_ins.insert(check_in_id, check_in);
            response
        }
        GateOutcome::TooFar(gate) => {
            let distance = gate.distance_meters();
            let degraded = gate.last_result().map(|r| r.degraded_accuracy).unwrap_or(false);
            let retry = gate.retry();
            let response = AttemptResponse {
                session_id: id,
                state: state_name,
                within_range: false,
                distance_meters: Some(distance),
                degraded_accuracy: degraded,
                error_code: None,
                check_in_id: None,
                attempts: retry.attempts(),
                not_before: Some(retry.position_request().not_before),
            };
            state.proximity.park(id, retry);
            response
        }
        GateOutcome::Failed(gate) => {
            let code = gate.error().map(|e| e.as_code().to_string());
            let retry = gate.retry();
            let response = AttemptResponse {
                session_id: id,
                state: state_name,
                within_range: false,
                distance_meters: None,
                degraded_accuracy: false,
                error_code: code,
                check_in_id: None,
                attempts: retry.attempts(),
                not_before: Some(retry.position_request().not_before),
            };
            state.proximity.park(id, retry);
            response
        }
        GateOutcome::Cancelled(gate) => AttemptResponse {
            session_id: id,
            state: state_name,
            within_range: false,
            distance_meters: None,
            degraded_accuracy: false,
            error_code: None,
            check_in_id: None,
            attempts: gate.attempts(),
            not_before: None,
        },
    };
    Ok(Json(response))
}

/// DELETE /v1/proximity/sessions/{id} — Cancel an open session.
#[utoipa::path(
    delete,
    path = "/v1/proximity/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session cancelled", body = CancelledResponse),
        (status = 404, description = "Session not found", body = crate::error::ErrorBody),
    ),
    tag = "proximity"
)]
pub async fn cancel_session(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelledResponse>, AppError> {
    let gate = take_own_session(&state, &caller, id)?;
    let cancelled = gate.cancel();
    Ok(Json(CancelledResponse {
        session_id: id,
        state: cancelled.state().as_str().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{admin, send, token, Harness};
    use axum::http::StatusCode;
    use axum::Router;
    use campus_core::Timestamp;
    use serde_json::{json, Value};
    use uuid::Uuid;

    // Lagos, Yaba.
    const LAT: f64 = 6.5158;
    const LNG: f64 = 3.3707;

    async fn assigned_task(app: &Router, agent: Uuid) -> String {
        let (status, task) = send(
            app,
            "POST",
            "/v1/tasks",
            &admin(),
            Some(json!({"lat": LAT, "lng": LNG, "commission_amount": 2_500, "agent_id": agent})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        task["id"].as_str().unwrap().to_string()
    }

    async fn open(app: &Router, agent: Uuid, task_id: &str) -> Value {
        let (status, body) = send(
            app,
            "POST",
            "/v1/proximity/sessions",
            &token("agent", agent),
            Some(json!({"task_id": task_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    #[tokio::test]
    async fn fix_on_site_issues_check_in() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = assigned_task(&app, agent).await;
        let session = open(&app, agent, &task_id).await;
        let sid = session["session_id"].as_str().unwrap();

        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/proximity/sessions/{sid}/fix"),
            &token("agent", agent),
            Some(json!({"lat": LAT + 0.0002, "lng": LNG, "accuracy_meters": 8.0, "captured_at": Timestamp::now()})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "VERIFIED");
        assert_eq!(body["within_range"], true);
        assert_eq!(body["degraded_accuracy"], false);
        assert!(body["check_in_id"].is_string());
        assert_eq!(h.state.check_ins.len(), 1);
        assert!(h.state.proximity.is_empty());
    }

    #[tokio::test]
    async fn too_far_keeps_session_open_for_retry() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = assigned_task(&app, agent).await;
        let session = open(&app, agent, &task_id).await;
        let sid = session["session_id"].as_str().unwrap();
        let uri = format!("/v1/proximity/sessions/{sid}/fix");

        // ~1.1 km north.
        let (_, body) = send(
            &app,
            "POST",
            &uri,
            &token("agent", agent),
            Some(json!({"lat": LAT + 0.01, "lng": LNG, "accuracy_meters": 5.0, "captured_at": Timestamp::now()})),
        )
        .await;
        assert_eq!(body["state"], "TOO_FAR");
        assert!(body["distance_meters"].as_f64().unwrap() > 1_000.0);
        assert!(body["check_in_id"].is_null());

        let (_, body) = send(
            &app,
            "POST",
            &uri,
            &token("agent", agent),
            Some(json!({"lat": LAT, "lng": LNG, "accuracy_meters": 5.0, "captured_at": Timestamp::now()})),
        )
        .await;
        assert_eq!(body["state"], "VERIFIED");
    }

    #[tokio::test]
    async fn cached_fix_is_refused_as_unavailable() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = assigned_task(&app, agent).await;
        let session = open(&app, agent, &task_id).await;
        let sid = session["session_id"].as_str().unwrap();

        let (_, body) = send(
            &app,
            "POST",
            &format!("/v1/proximity/sessions/{sid}/fix"),
            &token("agent", agent),
            Some(json!({
                "lat": LAT, "lng": LNG, "accuracy_meters": 5.0,
                "captured_at": "2020-01-01T00:00:00Z",
            })),
        )
        .await;
        assert_eq!(body["state"], "FAILED");
        assert_eq!(body["error_code"], "position_unavailable");
        assert!(h.state.check_ins.is_empty());
    }

    #[tokio::test]
    async fn provider_error_is_relayed() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = assigned_task(&app, agent).await;
        let session = open(&app, agent, &task_id).await;
        let sid = session["session_id"].as_str().unwrap();

        let (_, body) = send(
            &app,
            "POST",
            &format!("/v1/proximity/sessions/{sid}/fix"),
            &token("agent", agent),
            Some(json!({"error": "permission_denied"})),
        )
        .await;
        assert_eq!(body["state"], "FAILED");
        assert_eq!(body["error_code"], "permission_denied");
    }

    #[tokio::test]
    async fn unassigned_agent_cannot_open_session() {
        let h = Harness::new();
        let app = h.app();
        let task_id = assigned_task(&app, Uuid::new_v4()).await;
        let (status, _) = send(
            &app,
            "POST",
            "/v1/proximity/sessions",
            &token("agent", Uuid::new_v4()),
            Some(json!({"task_id": task_id})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn other_agent_cannot_resolve_session() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = assigned_task(&app, agent).await;
        let session = open(&app, agent, &task_id).await;
        let sid = session["session_id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            "POST",
            &format!("/v1/proximity/sessions/{sid}/fix"),
            &token("agent", Uuid::new_v4()),
            Some(json!({"lat": LAT, "lng": LNG, "accuracy_meters": 5.0, "captured_at": Timestamp::now()})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(h.state.proximity.len(), 1);
    }

    #[tokio::test]
    async fn cancel_closes_session() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = assigned_task(&app, agent).await;
        let session = open(&app, agent, &task_id).await;
        let sid = session["session_id"].as_str().unwrap();
        let uri = format!("/v1/proximity/sessions/{sid}");

        let (status, body) = send(&app, "DELETE", &uri, &token("agent", agent), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "CANCELLED");
        let (status, _) = send(&app, "DELETE", &uri, &token("agent", agent), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fix_without_coordinates_is_rejected() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = assigned_task(&app, agent).await;
        let session = open(&app, agent, &task_id).await;
        let sid = session["session_id"].as_str().unwrap();
        let (status, _) = send(
            &app,
            "POST",
            &format!("/v1/proximity/sessions/{sid}/fix"),
            &token("agent", agent),
            Some(json!({"lat": LAT})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn fix_without_capture_time_is_rejected() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = assigned_task(&app, agent).await;
        let session = open(&app, agent, &task_id).await;
        let sid = session["session_id"].as_str().unwrap();
        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/proximity/sessions/{sid}/fix"),
            &token("agent", agent),
            Some(json!({"lat": LAT, "lng": LNG, "accuracy_meters": 5.0})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["message"].as_str().unwrap().contains("captured_at"));
        // The session is untouched and still accepts a proper fix.
        assert_eq!(h.state.proximity.len(), 1);
        assert!(h.state.check_ins.is_empty());
    }

    #[tokio::test]
    async fn replayed_capture_time_is_refused_after_retry() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = assigned_task(&app, agent).await;
        let session = open(&app, agent, &task_id).await;
        let sid = session["session_id"].as_str().unwrap();
        let uri = format!("/v1/proximity/sessions/{sid}/fix");

        // A device clock running ahead keeps the capture time inside the
        // retry window, so only the replay rule can catch the repeat.
        let captured_at = Timestamp::now().plus(chrono::Duration::seconds(5));
        let (_, first) = send(
            &app,
            "POST",
            &uri,
            &token("agent", agent),
            Some(json!({"lat": LAT + 0.01, "lng": LNG, "accuracy_meters": 5.0, "captured_at": captured_at})),
        )
        .await;
        assert_eq!(first["state"], "TOO_FAR");

        let (_, replay) = send(
            &app,
            "POST",
            &uri,
            &token("agent", agent),
            Some(json!({"lat": LAT, "lng": LNG, "accuracy_meters": 5.0, "captured_at": captured_at})),
        )
        .await;
        assert_eq!(replay["state"], "FAILED");
        assert_eq!(replay["error_code"], "position_unavailable");
        assert!(h.state.check_ins.is_empty());

        let (_, fresh) = send(
            &app,
            "POST",
            &uri,
            &token("agent", agent),
            Some(json!({"lat": LAT, "lng": LNG, "accuracy_meters": 5.0, "captured_at": Timestamp::now()})),
        )
        .await;
        assert_eq!(fresh["state"], "VERIFIED");
    }

    #[tokio::test]
    async fn fix_after_request_timeout_fails_with_timeout() {
        let mut engine = crate::bootstrap::EngineConfig::default();
        engine.proximity.request_timeout_secs = 1;
        let h = Harness::with_engine(engine);
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = assigned_task(&app, agent).await;
        let session = open(&app, agent, &task_id).await;
        assert_eq!(session["timeout_secs"], 1);
        let sid = session["session_id"].as_str().unwrap();
        let uri = format!("/v1/proximity/sessions/{sid}/fix");

        tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
        let (_, body) = send(
            &app,
            "POST",
            &uri,
            &token("agent", agent),
            Some(json!({"lat": LAT, "lng": LNG, "accuracy_meters": 5.0, "captured_at": Timestamp::now()})),
        )
        .await;
        assert_eq!(body["state"], "FAILED");
        assert_eq!(body["error_code"], "timeout");
        assert!(body["check_in_id"].is_null());
        assert!(h.state.check_ins.is_empty());

        // The retry opens a fresh window.
        let (_, body) = send(
            &app,
            "POST",
            &uri,
            &token("agent", agent),
            Some(json!({"lat": LAT, "lng": LNG, "accuracy_meters": 5.0, "captured_at": Timestamp::now()})),
        )
        .await;
        assert_eq!(body["state"], "VERIFIED");
    }
}
