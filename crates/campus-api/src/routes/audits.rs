//! # Field Audit API
//!
//! Drafts are keyed by agent: one agent has at most one draft. An audit
//! starts only from a check-in issued by a verified proximity session.
//!
//! - `POST /v1/audits`: start an audit from a check-in (agent)
//! - `GET|PATCH /v1/audits/:agent_id`: read or update the draft
//! - `POST /v1/audits/:agent_id/amenities/:amenity_id/toggle`
//! - `POST /v1/audits/:agent_id/media`, `DELETE /v1/audits/:agent_id/media/:media_id`
//! - `POST /v1/audits/:agent_id/submit`: validate and submit; the draft is kept on failure
//!
//! Draft routes accept the owning agent or an admin.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use campus_audit::{DraftPatch, FieldAuditReport, MediaItem, MediaKind, RentPeriod, TaskStatus};
use campus_core::{AgentId, Amount, MediaId, Timestamp};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────────────

/// Start an audit.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartAuditRequest {
    /// Token returned by a verified proximity session.
    pub check_in_id: Uuid,
}

impl Validate for StartAuditRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Attach an uploaded photo or video.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMediaRequest {
    /// Client-chosen id. Generated when absent.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub url: String,
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "photo")]
    pub kind: MediaKind,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub captured_at: Option<Timestamp>,
}

impl Validate for AddMediaRequest {
    fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("url must not be empty".into());
        }
        Ok(())
    }
}

/// Partial update of the draft's free-form sections. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateDraftRequest {
    /// Rent quoted on site, in minor units.
    pub physical_rent_quote: Option<i64>,
    #[schema(value_type = Option<String>, example = "yearly")]
    pub rent_period: Option<RentPeriod>,
    pub is_rent_match: Option<bool>,
    pub is_manager_valid: Option<bool>,
    pub manager_notes: Option<String>,
    pub poi_suggestions: Option<Vec<String>>,
    pub comments: Option<String>,
}

impl Validate for UpdateDraftRequest {
    fn validate(&self) -> Result<(), String> {
        if matches!(self.physical_rent_quote, Some(q) if q < 0) {
            return Err("physical_rent_quote must not be negative".into());
        }
        Ok(())
    }
}

impl UpdateDraftRequest {
    fn into_patch(self) -> Result<DraftPatch, AppError> {
        Ok(DraftPatch {
            physical_rent_quote: self.physical_rent_quote.map(Amount::new).transpose()?,
            rent_period: self.rent_period,
            is_rent_match: self.is_rent_match,
            is_manager_valid: self.is_manager_valid,
            manager_notes: self.manager_notes,
            poi_suggestions: self.poi_suggestions,
            comments: self.comments,
        })
    }
}

/// The agent's draft.
#[derive(Debug, Serialize, ToSchema)]
pub struct DraftResponse {
    #[schema(value_type = Object)]
    pub draft: FieldAuditReport,
    /// Media still needed before submission.
    pub media_missing: usize,
}

impl DraftResponse {
    fn new(draft: FieldAuditReport, min_media: usize) -> Self {
        let media_missing = min_media.saturating_sub(draft.media.len());
        Self {
            draft,
            media_missing,
        }
    }
}

/// Server acknowledgment of a submitted report.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    pub report_id: Uuid,
    pub task_id: Uuid,
    pub digest: String,
    #[schema(value_type = String)]
    pub accepted_at: Timestamp,
    #[schema(value_type = Option<String>)]
    pub task_status: Option<TaskStatus>,
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the audits router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audits", post(start_audit))
        .route("/v1/audits/:agent_id", get(get_draft).patch(update_draft))
        .route(
            "/v1/audits/:agent_id/amenities/:amenity_id/toggle",
            post(toggle_amenity),
        )
        .route("/v1/audits/:agent_id/media", post(add_media))
        .route("/v1/audits/:agent_id/media/:media_id", delete(remove_media))
        .route("/v1/audits/:agent_id/submit", post(submit_audit))
}

/// The draft owner named in the path, if the caller may act for them.
fn draft_owner(caller: &CallerIdentity, agent_id: Uuid) -> Result<AgentId, AppError> {
    if caller.is_admin() {
        return Ok(AgentId::from_uuid(agent_id));
    }
    let agent = caller.require_agent()?;
    if *agent.as_uuid() != agent_id {
        return Err(AppError::Forbidden("draft belongs to another agent".into()));
    }
    Ok(agent)
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// POST /v1/audits — Start an audit from a verified check-in.
///
/// The check-in is consumed. An existing unsubmitted draft is replaced.
/// Check-ins older than `proximity.check_in_ttl_secs` are discarded and the
/// agent must pass the proximity gate again.
#[utoipa::path(
    post,
    path = "/v1/audits",
    request_body = StartAuditRequest,
    responses(
        (status = 201, description = "Draft started", body = DraftResponse),
        (status = 403, description = "Check-in issued to another agent", body = crate::error::ErrorBody),
        (status = 404, description = "Check-in or task not found", body = crate::error::ErrorBody),
        (status = 409, description = "Check-in expired, or task does not accept an audit", body = crate::error::ErrorBody),
    ),
    tag = "audits"
)]
pub async fn start_audit(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<StartAuditRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DraftResponse>), AppError> {
    let agent = caller.require_agent()?;
    let req = extract_validated_json(body)?;
    let check_in = state
        .check_ins
        .remove(&req.check_in_id)
        .ok_or_else(|| AppError::NotFound(format!("check-in {} not found", req.check_in_id)))?;
    if check_in.agent_id() != agent {
        state.check_ins.insert(req.check_in_id, check_in);
        return Err(AppError::Forbidden(
            "check-in was issued to another agent".into(),
        ));
    }
    let ttl = state.engine_config.proximity.check_in_ttl();
    if !check_in.is_fresh(ttl, Timestamp::now()) {
        tracing::info!(check_in_id = %req.check_in_id, %agent, "expired check-in discarded");
        return Err(AppError::Conflict(format!(
            "check-in {} has expired; verify proximity again",
            req.check_in_id
        )));
    }

    let task_key = *check_in.task_id().as_uuid();
    let Some(task) = state.tasks.get(&task_key) else {
        return Err(AppError::NotFound(format!("task {task_key} not found")));
    };
    let draft = match state.audits.start_audit(&task, &check_in) {
        Ok(draft) => draft,
        Err(e) => {
            state.check_ins.insert(req.check_in_id, check_in);
            return Err(e.into());
        }
    };
    state
        .tasks
        .try_update(&task_key, |t| t.begin_audit(agent))
        .ok_or_else(|| AppError::NotFound(format!("task {task_key} not found")))??;

    let min_media = state.audits.config().min_media;
    Ok((StatusCode::CREATED, Json(DraftResponse::new(draft, min_media))))
}

/// GET /v1/audits/{agent_id} — The agent's current draft.
#[utoipa::path(
    get,
    path = "/v1/audits/{agent_id}",
    params(("agent_id" = Uuid, Path, description = "Agent ID")),
    responses(
        (status = 200, description = "Current draft", body = DraftResponse),
        (status = 404, description = "No active draft", body = crate::error::ErrorBody),
    ),
    tag = "audits"
)]
pub async fn get_draft(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<DraftResponse>, AppError> {
    let agent = draft_owner(&caller, agent_id)?;
    let draft = state
        .audits
        .draft(agent)?
        .ok_or_else(|| AppError::NotFound(format!("no active draft for {agent}")))?;
    Ok(Json(DraftResponse::new(draft, state.audits.config().min_media)))
}

/// PATCH /v1/audits/{agent_id} — Update the draft's free-form sections.
#[utoipa::path(
    patch,
    path = "/v1/audits/{agent_id}",
    params(("agent_id" = Uuid, Path, description = "Agent ID")),
    request_body = UpdateDraftRequest,
    responses(
        (status = 200, description = "Draft updated", body = DraftResponse),
        (status = 404, description = "No active draft", body = crate::error::ErrorBody),
    ),
    tag = "audits"
)]
pub async fn update_draft(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(agent_id): Path<Uuid>,
    body: Result<Json<UpdateDraftRequest>, JsonRejection>,
) -> Result<Json<DraftResponse>, AppError> {
    let agent = draft_owner(&caller, agent_id)?;
    let patch = extract_validated_json(body)?.into_patch()?;
    let draft = state.audits.update_draft(agent, patch)?;
    Ok(Json(DraftResponse::new(draft, state.audits.config().min_media)))
}

/// POST /v1/audits/{agent_id}/amenities/{amenity_id}/toggle — Flip an amenity confirmation.
#[utoipa::path(
    post,
    path = "/v1/audits/{agent_id}/amenities/{amenity_id}/toggle",
    params(
        ("agent_id" = Uuid, Path, description = "Agent ID"),
        ("amenity_id" = String, Path, description = "Amenity ID"),
    ),
    responses(
        (status = 200, description = "Amenity toggled", body = DraftResponse),
        (status = 404, description = "No draft or amenity not listed", body = crate::error::ErrorBody),
    ),
    tag = "audits"
)]
pub async fn toggle_amenity(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((agent_id, amenity_id)): Path<(Uuid, String)>,
) -> Result<Json<DraftResponse>, AppError> {
    let agent = draft_owner(&caller, agent_id)?;
    let draft = state.audits.toggle_amenity(agent, &amenity_id)?;
    Ok(Json(DraftResponse::new(draft, state.audits.config().min_media)))
}

/// POST /v1/audits/{agent_id}/media — Attach a media item.
#[utoipa::path(
    post,
    path = "/v1/audits/{agent_id}/media",
    params(("agent_id" = Uuid, Path, description = "Agent ID")),
    request_body = AddMediaRequest,
    responses(
        (status = 201, description = "Media attached", body = DraftResponse),
        (status = 409, description = "Media id already attached", body = crate::error::ErrorBody),
    ),
    tag = "audits"
)]
pub async fn add_media(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(agent_id): Path<Uuid>,
    body: Result<Json<AddMediaRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DraftResponse>), AppError> {
    let agent = draft_owner(&caller, agent_id)?;
    let req = extract_validated_json(body)?;
    let item = MediaItem {
        id: req.id.map(MediaId::from_uuid).unwrap_or_default(),
        url: req.url,
        kind: req.kind,
        captured_at: req.captured_at.unwrap_or_else(Timestamp::now),
    };
    let draft = state.audits.add_media(agent, item)?;
    Ok((
        StatusCode::CREATED,
        Json(DraftResponse::new(draft, state.audits.config().min_media)),
    ))
}

/// DELETE /v1/audits/{agent_id}/media/{media_id} — Detach a media item.
#[utoipa::path(
    delete,
    path = "/v1/audits/{agent_id}/media/{media_id}",
    params(
        ("agent_id" = Uuid, Path, description = "Agent ID"),
        ("media_id" = Uuid, Path, description = "Media ID"),
    ),
    responses(
        (status = 200, description = "Media removed", body = DraftResponse),
        (status = 404, description = "Media not in draft", body = crate::error::ErrorBody),
    ),
    tag = "audits"
)]
pub async fn remove_media(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((agent_id, media_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DraftResponse>, AppError> {
    let agent = draft_owner(&caller, agent_id)?;
    let draft = state
        .audits
        .remove_media(agent, MediaId::from_uuid(media_id))?;
    Ok(Json(DraftResponse::new(draft, state.audits.config().min_media)))
}

/// POST /v1/audits/{agent_id}/submit — Validate and submit the draft.
///
/// On acknowledgment the draft is cleared and the task completes. Validation
/// failures list every issue in form order under `error.details.issues`.
#[utoipa::path(
    post,
    path = "/v1/audits/{agent_id}/submit",
    params(("agent_id" = Uuid, Path, description = "Agent ID")),
    responses(
        (status = 200, description = "Report accepted", body = SubmitResponse),
        (status = 404, description = "No active draft", body = crate::error::ErrorBody),
        (status = 422, description = "Draft incomplete", body = crate::error::ErrorBody),
        (status = 503, description = "Report intake unavailable; draft retained", body = crate::error::ErrorBody),
    ),
    tag = "audits"
)]
pub async fn submit_audit(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<SubmitResponse>, AppError> {
    let agent = draft_owner(&caller, agent_id)?;
    let receipt = state.audits.submit(agent).await?;

    let task_key = *receipt.task_id.as_uuid();
    let task_status = match state.tasks.try_update(&task_key, |t| {
        t.complete(agent)?;
        Ok::<_, campus_audit::TaskError>(t.status)
    }) {
        Some(Ok(status)) => Some(status),
        Some(Err(e)) => {
            tracing::warn!(task_id = %receipt.task_id, error = %e, "report accepted but task not completed");
            None
        }
        None => None,
    };

    Ok(Json(SubmitResponse {
        report_id: receipt.report_id,
        task_id: task_key,
        digest: receipt.digest,
        accepted_at: receipt.accepted_at,
        task_status,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{admin, send, token, Harness};
    use axum::http::StatusCode;
    use axum::Router;
    use campus_audit::SubmitterError;
    use campus_core::Timestamp;
    use serde_json::json;
    use uuid::Uuid;

    const LAT: f64 = 9.0579;
    const LNG: f64 = 7.4951;

    /// Register an assigned task, verify proximity, start the audit.
    async fn started(app: &Router, agent: Uuid) -> String {
        let (_, task) = send(
            app,
            "POST",
            "/v1/tasks",
            &admin(),
            Some(json!({
                "lat": LAT, "lng": LNG, "commission_amount": 3_000,
                "amenities": [{"id": "water", "label": "Running water"}],
                "agent_id": agent,
            })),
        )
        .await;
        let task_id = task["id"].as_str().unwrap().to_string();
        let (_, session) = send(
            app,
            "POST",
            "/v1/proximity/sessions",
            &token("agent", agent),
            Some(json!({"task_id": task_id})),
        )
        .await;
        let sid = session["session_id"].as_str().unwrap();
        let (_, attempt) = send(
            app,
            "POST",
            &format!("/v1/proximity/sessions/{sid}/fix"),
            &token("agent", agent),
            Some(json!({"lat": LAT, "lng": LNG, "accuracy_meters": 6.0, "captured_at": Timestamp::now()})),
        )
        .await;
        let check_in_id = attempt["check_in_id"].as_str().unwrap();
        let (status, _) = send(
            app,
            "POST",
            "/v1/audits",
            &token("agent", agent),
            Some(json!({"check_in_id": check_in_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        task_id
    }

    async fn complete_draft(app: &Router, agent: Uuid) {
        let tok = token("agent", agent);
        let (status, _) = send(
            app,
            "PATCH",
            &format!("/v1/audits/{agent}"),
            &tok,
            Some(json!({"physical_rent_quote": 450_000, "is_rent_match": true, "is_manager_valid": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        for n in 0..2 {
            let (status, _) = send(
                app,
                "POST",
                &format!("/v1/audits/{agent}/media"),
                &tok,
                Some(json!({"url": format!("https://cdn.example/p{n}.jpg"), "type": "photo"})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
    }

    #[tokio::test]
    async fn full_audit_submits_and_completes_task() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let task_id = started(&app, agent).await;

        let (_, task) = send(&app, "GET", &format!("/v1/tasks/{task_id}"), &admin(), None).await;
        assert_eq!(task["status"], "in_progress");

        let (status, draft) = send(
            &app,
            "POST",
            &format!("/v1/audits/{agent}/amenities/water/toggle"),
            &token("agent", agent),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(draft["draft"]["amenities"][0]["confirmed"], true);

        complete_draft(&app, agent).await;
        let (status, receipt) = send(
            &app,
            "POST",
            &format!("/v1/audits/{agent}/submit"),
            &token("agent", agent),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["task_status"], "completed");
        assert_eq!(h.submitter.accepted().len(), 1);

        let (status, _) = send(&app, "GET", &format!("/v1/audits/{agent}"), &token("agent", agent), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn incomplete_draft_lists_every_issue() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        started(&app, agent).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/audits/{agent}/submit"),
            &token("agent", agent),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let issues = body["error"]["details"]["issues"].as_array().unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0]["section"], "rent");
        assert_eq!(issues[1]["section"], "media");
    }

    #[tokio::test]
    async fn intake_outage_retains_draft() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        started(&app, agent).await;
        complete_draft(&app, agent).await;

        h.submitter.fail_next(SubmitterError::Unavailable {
            reason: "connection reset".into(),
        });
        let uri = format!("/v1/audits/{agent}/submit");
        let (status, _) = send(&app, "POST", &uri, &token("agent", agent), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, draft) = send(&app, "GET", &format!("/v1/audits/{agent}"), &token("agent", agent), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(draft["draft"]["media"].as_array().unwrap().len(), 2);

        let (status, _) = send(&app, "POST", &uri, &token("agent", agent), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn check_in_is_single_use() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        started(&app, agent).await;
        assert!(h.state.check_ins.is_empty());
    }

    #[tokio::test]
    async fn expired_check_in_is_refused_and_discarded() {
        let mut engine = crate::bootstrap::EngineConfig::default();
        engine.proximity.check_in_ttl_secs = 1;
        let h = Harness::with_engine(engine);
        let app = h.app();
        let agent = Uuid::new_v4();
        let (_, task) = send(
            &app,
            "POST",
            "/v1/tasks",
            &admin(),
            Some(json!({"lat": LAT, "lng": LNG, "commission_amount": 3_000, "agent_id": agent})),
        )
        .await;
        let (_, session) = send(
            &app,
            "POST",
            "/v1/proximity/sessions",
            &token("agent", agent),
            Some(json!({"task_id": task["id"]})),
        )
        .await;
        let sid = session["session_id"].as_str().unwrap();
        let (_, attempt) = send(
            &app,
            "POST",
            &format!("/v1/proximity/sessions/{sid}/fix"),
            &token("agent", agent),
            Some(json!({"lat": LAT, "lng": LNG, "accuracy_meters": 6.0, "captured_at": Timestamp::now()})),
        )
        .await;
        assert_eq!(attempt["state"], "VERIFIED");

        tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
        let (status, body) = send(
            &app,
            "POST",
            "/v1/audits",
            &token("agent", agent),
            Some(json!({"check_in_id": attempt["check_in_id"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"]["message"].as_str().unwrap().contains("expired"));
        assert!(h.state.check_ins.is_empty());
        assert!(h.state.audits.draft(campus_core::AgentId::from_uuid(agent)).unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_check_in_is_404() {
        let h = Harness::new();
        let agent = Uuid::new_v4();
        let (status, _) = send(
            &h.app(),
            "POST",
            "/v1/audits",
            &token("agent", agent),
            Some(json!({"check_in_id": Uuid::new_v4()})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_agents_draft_is_forbidden() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        started(&app, agent).await;
        let (status, _) = send(
            &app,
            "GET",
            &format!("/v1/audits/{agent}"),
            &token("agent", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, "GET", &format!("/v1/audits/{agent}"), &admin(), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_and_missing_media() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        started(&app, agent).await;
        let tok = token("agent", agent);
        let media_id = Uuid::new_v4();
        let body = json!({"id": media_id, "url": "https://cdn.example/v.mp4", "type": "video"});
        let uri = format!("/v1/audits/{agent}/media");

        let (status, _) = send(&app, "POST", &uri, &tok, Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(&app, "POST", &uri, &tok, Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, "DELETE", &format!("{uri}/{media_id}"), &tok, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "DELETE", &format!("{uri}/{media_id}"), &tok, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unlisted_amenity_is_404() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        started(&app, agent).await;
        let (status, _) = send(
            &app,
            "POST",
            &format!("/v1/audits/{agent}/amenities/pool/toggle"),
            &token("agent", agent),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
