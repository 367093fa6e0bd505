//! # Verification Task API
//!
//! Tasks come from the scheduling collaborator. The engine only needs a
//! task's property location, assignee and status.
//!
//! - `POST /v1/tasks`: register a task, optionally assigned (admin)
//! - `GET /v1/tasks/:id`: task for its assignee or admin
//! - `POST /v1/tasks/:id/assign`: (re)assign an agent (admin)

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use campus_audit::{Amenity, TaskPriority, TaskStatus, VerificationTask};
use campus_core::{AgentId, Amount, GeoPoint, Timestamp};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────────────

/// A listed amenity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AmenityInput {
    pub id: String,
    pub label: String,
}

/// Register a verification task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub lat: f64,
    pub lng: f64,
    /// Agent payout in minor units.
    pub commission_amount: i64,
    #[serde(default)]
    pub amenities: Vec<AmenityInput>,
    #[serde(default)]
    #[schema(value_type = String, example = "normal")]
    pub priority: TaskPriority,
    /// Assign immediately.
    #[serde(default)]
    pub agent_id: Option<Uuid>,
}

impl Validate for CreateTaskRequest {
    fn validate(&self) -> Result<(), String> {
        GeoPoint::new(self.lat, self.lng).map_err(|e| e.to_string())?;
        if self.commission_amount < 0 {
            return Err("commission_amount must not be negative".into());
        }
        if self.amenities.iter().any(|a| a.id.trim().is_empty()) {
            return Err("amenity ids must not be empty".into());
        }
        Ok(())
    }
}

/// Assign a task.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTaskRequest {
    pub agent_id: Uuid,
}

impl Validate for AssignTaskRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A verification task.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    #[schema(value_type = String, example = "assigned")]
    pub status: TaskStatus,
    #[schema(value_type = String)]
    pub priority: TaskPriority,
    pub lat: f64,
    pub lng: f64,
    pub assigned_agent_id: Option<Uuid>,
    pub commission_amount: i64,
    pub amenities: Vec<AmenityInput>,
    #[schema(value_type = String)]
    pub updated_at: Timestamp,
}

impl From<&VerificationTask> for TaskResponse {
    fn from(t: &VerificationTask) -> Self {
        Self {
            id: *t.id.as_uuid(),
            status: t.status,
            priority: t.priority,
            lat: t.property_geom.lat,
            lng: t.property_geom.lng,
            assigned_agent_id: t.assigned_agent_id.map(|a| *a.as_uuid()),
            commission_amount: t.commission_amount.minor_units(),
            amenities: t
                .listed_amenities
                .iter()
                .map(|a| AmenityInput {
                    id: a.id.clone(),
                    label: a.label.clone(),
                })
                .collect(),
            updated_at: t.updated_at,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the tasks router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/tasks", post(create_task))
        .route("/v1/tasks/:id", get(get_task))
        .route("/v1/tasks/:id/assign", post(assign_task))
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// POST /v1/tasks — Register a verification task.
#[utoipa::path(
    post,
    path = "/v1/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task registered", body = TaskResponse),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn create_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskResponse>), AppError> {
    require_role(&caller, &[])?;
    let req = extract_validated_json(body)?;
    let amenities = req
        .amenities
        .into_iter()
        .map(|a| Amenity {
            id: a.id,
            label: a.label,
        })
        .collect();
    let mut task = VerificationTask::new(
        GeoPoint::new(req.lat, req.lng)?,
        Amount::new(req.commission_amount)?,
        amenities,
        req.priority,
    );
    if let Some(agent) = req.agent_id {
        task.assign(AgentId::from_uuid(agent))?;
    }
    state.tasks.insert(*task.id.as_uuid(), task.clone());
    tracing::info!(task_id = %task.id, status = %task.status, "verification task registered");
    Ok((StatusCode::CREATED, Json(TaskResponse::from(&task))))
}

/// GET /v1/tasks/{id} — Task for its assignee or an admin.
#[utoipa::path(
    get,
    path = "/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = TaskResponse),
        (status = 404, description = "Task not found", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, AppError> {
    let task = state
        .tasks
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("task {id} not found")))?;
    if !caller.is_admin() {
        let agent = caller.require_agent()?;
        task.require_assignee(agent)?;
    }
    Ok(Json(TaskResponse::from(&task)))
}

/// POST /v1/tasks/{id}/assign — Assign or reassign an agent.
#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/assign",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = AssignTaskRequest,
    responses(
        (status = 200, description = "Task assigned", body = TaskResponse),
        (status = 409, description = "Task is in progress or completed", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn assign_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AssignTaskRequest>, JsonRejection>,
) -> Result<Json<TaskResponse>, AppError> {
    require_role(&caller, &[])?;
    let req = extract_validated_json(body)?;
    let task = state
        .tasks
        .try_update(&id, |task| {
            task.assign(AgentId::from_uuid(req.agent_id))?;
            Ok::<_, AppError>(task.clone())
        })
        .ok_or_else(|| AppError::NotFound(format!("task {id} not found")))??;
    Ok(Json(TaskResponse::from(&task)))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{admin, send, token, Harness};
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn admin_registers_assigned_task_and_agent_reads_it() {
        let h = Harness::new();
        let app = h.app();
        let agent = Uuid::new_v4();
        let (status, task) = send(
            &app,
            "POST",
            "/v1/tasks",
            &admin(),
            Some(json!({
                "lat": 6.5244, "lng": 3.3792, "commission_amount": 5_000,
                "amenities": [{"id": "borehole", "label": "Borehole"}],
                "agent_id": agent,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["status"], "assigned");
        let id = task["id"].as_str().unwrap();

        let (status, body) = send(&app, "GET", &format!("/v1/tasks/{id}"), &token("agent", agent), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amenities"][0]["id"], "borehole");

        let (status, _) = send(
            &app,
            "GET",
            &format!("/v1/tasks/{id}"),
            &token("agent", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_coordinates_rejected() {
        let h = Harness::new();
        let (status, _) = send(
            &h.app(),
            "POST",
            "/v1/tasks",
            &admin(),
            Some(json!({"lat": 91.0, "lng": 0.0, "commission_amount": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn agents_cannot_register_tasks() {
        let h = Harness::new();
        let (status, _) = send(
            &h.app(),
            "POST",
            "/v1/tasks",
            &token("agent", Uuid::new_v4()),
            Some(json!({"lat": 0.0, "lng": 0.0, "commission_amount": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn assign_unknown_task_is_404() {
        let h = Harness::new();
        let (status, _) = send(
            &h.app(),
            "POST",
            &format!("/v1/tasks/{}/assign", Uuid::new_v4()),
            &admin(),
            Some(json!({"agent_id": Uuid::new_v4()})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
