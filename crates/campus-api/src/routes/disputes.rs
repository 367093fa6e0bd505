//! # Dispute Adjudication API
//!
//! - `GET /v1/disputes/:id`: dispute with its advisory band
//! - `POST /v1/disputes/:id/score`: ask the evidence scorer (admin)
//! - `POST /v1/disputes/:id/resolve`: human decision, settles the order (admin)
//!
//! Disputes are raised through `POST /v1/orders/:id/disputes`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use campus_arbitration::{Decision, Dispute, DisputeStatus};
use campus_core::{DisputeId, Timestamp};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::require_party;
use crate::auth::{require_role, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────────────

/// Administrator decision.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveDisputeRequest {
    #[schema(value_type = String, example = "resolved_seller")]
    pub decision: Decision,
    pub admin_notes: String,
}

impl Validate for ResolveDisputeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.admin_notes.trim().is_empty() {
            return Err("admin_notes must explain the decision".into());
        }
        Ok(())
    }
}

/// A dispute. `advisory_band` is display-only and never decides the outcome.
#[derive(Debug, Serialize, ToSchema)]
pub struct DisputeResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub task_id: Option<Uuid>,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub reason: String,
    pub buyer_evidence: Vec<String>,
    #[schema(value_type = String, example = "pending")]
    pub status: DisputeStatus,
    pub ai_match_score: Option<u8>,
    pub ai_summary: Option<String>,
    /// `good_match`, `partial_match` or `mismatch`.
    pub advisory_band: Option<String>,
    pub admin_notes: Option<String>,
    #[schema(value_type = Option<String>)]
    pub admin_decision: Option<Decision>,
    #[schema(value_type = String)]
    pub raised_at: Timestamp,
    #[schema(value_type = Option<String>)]
    pub resolved_at: Option<Timestamp>,
}

impl DisputeResponse {
    pub fn from_dispute(d: &Dispute) -> Self {
        Self {
            id: *d.id.as_uuid(),
            order_id: *d.order_id.as_uuid(),
            task_id: d.task_id.map(|t| *t.as_uuid()),
            buyer_id: *d.buyer_id.as_uuid(),
            seller_id: *d.seller_id.as_uuid(),
            reason: d.reason.clone(),
            buyer_evidence: d.buyer_evidence.clone(),
            status: d.status,
            ai_match_score: d.ai_match.as_ref().map(|m| m.score),
            ai_summary: d.ai_match.as_ref().map(|m| m.summary.clone()),
            advisory_band: d.advisory_band().map(|b| b.as_str().to_string()),
            admin_notes: d.admin_notes.clone(),
            admin_decision: d.admin_decision,
            raised_at: d.raised_at,
            resolved_at: d.resolved_at,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the disputes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/disputes/:id", get(get_dispute))
        .route("/v1/disputes/:id/score", post(score_dispute))
        .route("/v1/disputes/:id/resolve", post(resolve_dispute))
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// GET /v1/disputes/{id} — Dispute view for a party or admin.
#[utoipa::path(
    get,
    path = "/v1/disputes/{id}",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    responses(
        (status = 200, description = "Dispute found", body = DisputeResponse),
        (status = 404, description = "Dispute not found", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub async fn get_dispute(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<DisputeResponse>, AppError> {
    let dispute = state.adjudicator.dispute(DisputeId::from_uuid(id))?;
    require_party(
        &caller,
        &[*dispute.buyer_id.as_uuid(), *dispute.seller_id.as_uuid()],
    )?;
    Ok(Json(DisputeResponse::from_dispute(&dispute)))
}

/// POST /v1/disputes/{id}/score — Request an advisory evidence score.
#[utoipa::path(
    post,
    path = "/v1/disputes/{id}/score",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    responses(
        (status = 200, description = "Score recorded", body = DisputeResponse),
        (status = 409, description = "Dispute already resolved", body = crate::error::ErrorBody),
        (status = 503, description = "Evidence scorer unavailable", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub async fn score_dispute(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<DisputeResponse>, AppError> {
    require_role(&caller, &[])?;
    let scored = state
        .adjudicator
        .score_dispute(DisputeId::from_uuid(id))
        .await?;
    Ok(Json(DisputeResponse::from_dispute(&scored.dispute)))
}

/// POST /v1/disputes/{id}/resolve — Apply an administrator's decision.
///
/// Repeating the same decision is a no-op that returns the resolved dispute.
#[utoipa::path(
    post,
    path = "/v1/disputes/{id}/resolve",
    params(("id" = Uuid, Path, description = "Dispute ID")),
    request_body = ResolveDisputeRequest,
    responses(
        (status = 200, description = "Dispute resolved", body = DisputeResponse),
        (status = 409, description = "Already resolved the other way", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub async fn resolve_dispute(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ResolveDisputeRequest>, JsonRejection>,
) -> Result<Json<DisputeResponse>, AppError> {
    require_role(&caller, &[])?;
    let req = extract_validated_json(body)?;
    let dispute = state.adjudicator.resolve_dispute(
        DisputeId::from_uuid(id),
        req.decision,
        req.admin_notes,
    )?;
    Ok(Json(DisputeResponse::from_dispute(&dispute)))
}
