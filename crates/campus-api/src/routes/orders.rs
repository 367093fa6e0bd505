//! # Escrow Order API
//!
//! - `POST /v1/orders`: create an order in `created`
//! - `GET /v1/orders/:id`: order view, contacts passed through the disclosure policy
//! - `POST /v1/payments/captured`: payment collaborator event, `created → held`
//! - `POST /v1/orders/:id/fulfil`: record pickup/delivery
//! - `POST /v1/orders/:id/release`: release escrowed funds
//! - `POST /v1/orders/:id/disputes`: raise a dispute on a held or recently released order

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use campus_arbitration::RaiseDispute;
use campus_core::{Amount, CommissionRate, DisputeId, OrderId, OwnerId, TaskId, Timestamp};
use campus_escrow::{
    disclose_contact, ContactDetails, DisclosedContact, EscrowStatus, FulfillmentType, NewOrder,
    Order, OrderTransition, PaymentCaptured, ReleaseTrigger, TransitionOutcome,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::disputes::DisputeResponse;
use super::require_party;
use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────────────

/// Name, address and phone of one party.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ContactInput {
    pub name: String,
    pub address: String,
    pub phone: String,
}

impl From<ContactInput> for ContactDetails {
    fn from(c: ContactInput) -> Self {
        ContactDetails {
            name: c.name,
            address: c.address,
            phone: c.phone,
        }
    }
}

/// Create an escrow order.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Buyer. Required for admin callers, taken from the token for buyers.
    #[serde(default)]
    pub buyer_id: Option<Uuid>,
    pub seller_id: Uuid,
    /// Minor currency units.
    pub amount: i64,
    /// Platform commission in basis points; the configured default when absent.
    #[serde(default)]
    pub commission_bps: Option<u32>,
    #[schema(value_type = String, example = "pickup")]
    pub fulfillment_type: FulfillmentType,
    pub buyer_contact: ContactInput,
    pub seller_contact: ContactInput,
}

impl Validate for CreateOrderRequest {
    fn validate(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err("amount must be positive".into());
        }
        if self.commission_bps.is_some_and(|bps| bps > 10_000) {
            return Err("commission_bps must be at most 10000".into());
        }
        for (who, c) in [("buyer", &self.buyer_contact), ("seller", &self.seller_contact)] {
            if c.name.trim().is_empty() {
                return Err(format!("{who}_contact.name must not be empty"));
            }
        }
        Ok(())
    }
}

/// Payment collaborator event.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentCapturedRequest {
    pub order_id: Uuid,
    pub amount: i64,
}

impl Validate for PaymentCapturedRequest {
    fn validate(&self) -> Result<(), String> {
        if self.amount < 0 {
            return Err("amount must not be negative".into());
        }
        Ok(())
    }
}

/// Release escrowed funds.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReleaseRequest {
    /// Order version the caller last read.
    pub expected_version: u64,
    #[schema(value_type = String, example = "buyer_confirmed")]
    pub trigger: ReleaseTrigger,
}

impl Validate for ReleaseRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Raise a dispute.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RaiseDisputeRequest {
    /// Order version the caller last read.
    pub expected_version: u64,
    pub reason: String,
    /// Evidence URLs.
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Verification task to re-inspect, if the dispute is about a property.
    #[serde(default)]
    pub task_id: Option<Uuid>,
    /// Client-chosen id that makes retries idempotent.
    #[serde(default)]
    pub dispute_id: Option<Uuid>,
}

impl Validate for RaiseDisputeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.reason.trim().is_empty() {
            return Err("reason must not be empty".into());
        }
        Ok(())
    }
}

/// An order as seen through the disclosure policy.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub amount: i64,
    pub commission_bps: u32,
    pub seller_receives: i64,
    pub commission: i64,
    #[schema(value_type = String)]
    pub fulfillment_type: FulfillmentType,
    #[schema(value_type = String, example = "held")]
    pub status: EscrowStatus,
    /// Pass back as `expected_version` on release and dispute.
    pub version: u64,
    #[schema(value_type = Object)]
    pub buyer_contact: DisclosedContact,
    #[schema(value_type = Object)]
    pub seller_contact: DisclosedContact,
    #[schema(value_type = Option<String>)]
    pub dispute_id: Option<DisputeId>,
    #[schema(value_type = String)]
    pub created_at: Timestamp,
    #[schema(value_type = Option<String>)]
    pub paid_at: Option<Timestamp>,
    #[schema(value_type = Option<String>)]
    pub fulfilled_at: Option<Timestamp>,
    #[schema(value_type = Option<String>)]
    pub released_at: Option<Timestamp>,
    #[schema(value_type = Option<String>)]
    pub resolved_at: Option<Timestamp>,
    #[schema(value_type = Vec<Object>)]
    pub transitions: Vec<OrderTransition>,
}

impl OrderResponse {
    /// Build the view. Contacts are evaluated against the current status on
    /// every call.
    pub fn from_order(order: &Order) -> Self {
        let split = order.split();
        Self {
            id: *order.id.as_uuid(),
            buyer_id: *order.buyer_id.as_uuid(),
            seller_id: *order.seller_id.as_uuid(),
            amount: order.amount.minor_units(),
            commission_bps: order.commission_rate.bps(),
            seller_receives: split.seller_receives.minor_units(),
            commission: split.commission.minor_units(),
            fulfillment_type: order.fulfillment_type,
            status: order.status,
            version: order.version,
            buyer_contact: disclose_contact(order.status, &order.buyer_contact),
            seller_contact: disclose_contact(order.status, &order.seller_contact),
            dispute_id: order.dispute.as_ref().map(|d| d.dispute_id),
            created_at: order.created_at,
            paid_at: order.paid_at,
            fulfilled_at: order.fulfilled_at,
            released_at: order.released_at,
            resolved_at: order.resolved_at,
            transitions: order.transitions.clone(),
        }
    }
}

/// Result of an idempotent transition.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionResponse {
    /// False when the call was a duplicate and changed nothing.
    pub applied: bool,
    pub order: OrderResponse,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            applied: outcome.applied,
            order: OrderResponse::from_order(&outcome.order),
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/:id", get(get_order))
        .route("/v1/payments/captured", post(payment_captured))
        .route("/v1/orders/:id/fulfil", post(fulfil_order))
        .route("/v1/orders/:id/release", post(release_funds))
        .route("/v1/orders/:id/disputes", post(raise_dispute))
}

fn parties(order: &Order) -> [Uuid; 2] {
    [*order.buyer_id.as_uuid(), *order.seller_id.as_uuid()]
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// POST /v1/orders — Create an order.
#[utoipa::path(
    post,
    path = "/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    require_role(&caller, &[Role::Buyer])?;
    let req = extract_validated_json(body)?;
    let buyer_id = match (caller.role, req.buyer_id) {
        (Role::Admin, Some(id)) => OwnerId::from_uuid(id),
        (Role::Admin, None) => {
            return Err(AppError::Validation("buyer_id is required for admin callers".into()))
        }
        _ => caller
            .owner_id()
            .ok_or_else(|| AppError::Forbidden("buyer token has no subject".into()))?,
    };
    let commission_rate = req.commission_bps.map(CommissionRate::from_bps).transpose()?;
    let order = state.ledger.create_order(NewOrder {
        buyer_id,
        seller_id: OwnerId::from_uuid(req.seller_id),
        amount: Amount::new(req.amount)?,
        commission_rate,
        fulfillment_type: req.fulfillment_type,
        buyer_contact: req.buyer_contact.into(),
        seller_contact: req.seller_contact.into(),
    })?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from_order(&order))))
}

/// GET /v1/orders/{id} — Order view for a party or admin.
#[utoipa::path(
    get,
    path = "/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found", body = crate::error::ErrorBody),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.ledger.order(OrderId::from_uuid(id))?;
    require_party(&caller, &parties(&order))?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// POST /v1/payments/captured — Apply a payment-captured event.
#[utoipa::path(
    post,
    path = "/v1/payments/captured",
    request_body = PaymentCapturedRequest,
    responses(
        (status = 200, description = "Event applied or ignored as duplicate", body = TransitionResponse),
        (status = 422, description = "Amount does not match the order", body = crate::error::ErrorBody),
    ),
    tag = "orders"
)]
pub async fn payment_captured(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<PaymentCapturedRequest>, JsonRejection>,
) -> Result<Json<TransitionResponse>, AppError> {
    require_role(&caller, &[])?;
    let req = extract_validated_json(body)?;
    let outcome = state.ledger.capture_payment(PaymentCaptured {
        order_id: OrderId::from_uuid(req.order_id),
        amount: Amount::new(req.amount)?,
    })?;
    Ok(Json(outcome.into()))
}

/// POST /v1/orders/{id}/fulfil — Record that the goods were handed over.
#[utoipa::path(
    post,
    path = "/v1/orders/{id}/fulfil",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Fulfilment recorded", body = TransitionResponse),
        (status = 409, description = "Order is not held", body = crate::error::ErrorBody),
    ),
    tag = "orders"
)]
pub async fn fulfil_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionResponse>, AppError> {
    require_role(&caller, &[Role::Seller])?;
    let order_id = OrderId::from_uuid(id);
    let order = state.ledger.order(order_id)?;
    require_party(&caller, &[*order.seller_id.as_uuid()])?;
    Ok(Json(state.ledger.mark_fulfilled(order_id)?.into()))
}

/// POST /v1/orders/{id}/release — Release escrowed funds to the seller.
///
/// Buyers may confirm receipt (`buyer_confirmed`, `pickup_confirmed`,
/// `delivery_confirmed`); `admin_override` and `auto_release` are admin only.
#[utoipa::path(
    post,
    path = "/v1/orders/{id}/release",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = ReleaseRequest,
    responses(
        (status = 200, description = "Released, or already released", body = TransitionResponse),
        (status = 409, description = "Stale version or order not held", body = crate::error::ErrorBody),
    ),
    tag = "orders"
)]
pub async fn release_funds(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ReleaseRequest>, JsonRejection>,
) -> Result<Json<TransitionResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let order_id = OrderId::from_uuid(id);
    let order = state.ledger.order(order_id)?;
    match req.trigger {
        ReleaseTrigger::AdminOverride | ReleaseTrigger::AutoRelease => require_role(&caller, &[])?,
        ReleaseTrigger::BuyerConfirmed
        | ReleaseTrigger::PickupConfirmed
        | ReleaseTrigger::DeliveryConfirmed => {
            require_role(&caller, &[Role::Buyer])?;
            require_party(&caller, &[*order.buyer_id.as_uuid()])?;
        }
    }
    let fulfilment_matches = match req.trigger {
        ReleaseTrigger::PickupConfirmed => order.fulfillment_type == FulfillmentType::Pickup,
        ReleaseTrigger::DeliveryConfirmed => order.fulfillment_type == FulfillmentType::Delivery,
        _ => true,
    };
    if !fulfilment_matches {
        return Err(AppError::Validation(format!(
            "trigger {} does not match a {:?} order",
            req.trigger.as_str(),
            order.fulfillment_type
        )));
    }
    let outcome = state
        .ledger
        .release_funds(order_id, req.expected_version, req.trigger)?;
    Ok(Json(outcome.into()))
}

/// POST /v1/orders/{id}/disputes — Raise a dispute.
///
/// When `task_id` names a completed verification task, the task is sent
/// back for re-verification. The dispute stands even if the task cannot
/// be reopened.
#[utoipa::path(
    post,
    path = "/v1/orders/{id}/disputes",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = RaiseDisputeRequest,
    responses(
        (status = 201, description = "Dispute raised, or the existing one for a retried dispute_id", body = DisputeResponse),
        (status = 409, description = "Stale version, or order cannot be disputed", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub async fn raise_dispute(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<RaiseDisputeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DisputeResponse>), AppError> {
    require_role(&caller, &[Role::Buyer])?;
    let req = extract_validated_json(body)?;
    let order_id = OrderId::from_uuid(id);
    let order = state.ledger.order(order_id)?;
    require_party(&caller, &[*order.buyer_id.as_uuid()])?;

    if let Some(task_id) = req.task_id {
        if state.tasks.get(&task_id).is_none() {
            return Err(AppError::NotFound(format!("task {task_id} not found")));
        }
    }

    let dispute = state.adjudicator.raise_dispute(RaiseDispute {
        order_id,
        expected_version: req.expected_version,
        reason: req.reason,
        evidence: req.evidence,
        task_id: req.task_id.map(TaskId::from_uuid),
        dispute_id: req.dispute_id.map(DisputeId::from_uuid),
    })?;

    if let Some(task_id) = req.task_id {
        reopen_for_reverification(&state, task_id, dispute.id);
    }

    Ok((StatusCode::CREATED, Json(DisputeResponse::from_dispute(&dispute))))
}

/// Send a completed task back for re-verification after a dispute.
///
/// Runs after the dispute is committed, so a refused transition is logged
/// rather than returned.
fn reopen_for_reverification(state: &AppState, task_id: Uuid, dispute_id: DisputeId) {
    let reopened = state
        .tasks
        .try_update(&task_id, |task| task.request_reverification());
    match reopened {
        Some(Ok(())) => {
            tracing::info!(%task_id, %dispute_id, "task sent for re-verification");
        }
        Some(Err(e)) => {
            tracing::warn!(%task_id, %dispute_id, error = %e, "task not reopened for re-verification");
        }
        None => {
            tracing::warn!(%task_id, %dispute_id, "task vanished before re-verification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{admin, send, token, Harness};
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    fn order_body(seller: Uuid, amount: i64) -> serde_json::Value {
        json!({
            "seller_id": seller,
            "amount": amount,
            "fulfillment_type": "pickup",
            "buyer_contact": {"name": "Ada", "address": "1 Hall Rd", "phone": "+2348000000001"},
            "seller_contact": {"name": "Bo", "address": "2 Gate St", "phone": "+2348000000002"},
        })
    }

    #[tokio::test]
    async fn buyer_creates_then_seller_sees_redacted_buyer_until_paid() {
        let h = Harness::new();
        let app = h.app();
        let (buyer, seller) = (Uuid::new_v4(), Uuid::new_v4());

        let (status, created) = send(
            &app,
            "POST",
            "/v1/orders",
            &token("buyer", buyer),
            Some(order_body(seller, 150_000)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "created");
        assert_eq!(created["buyer_id"], json!(buyer));
        assert_eq!(created["seller_receives"], 135_000);
        assert_eq!(created["commission"], 15_000);
        assert_eq!(created["buyer_contact"]["name"]["visible"], false);
        assert_eq!(created["buyer_contact"]["name"]["value"], "[REDACTED]");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, captured) = send(
            &app,
            "POST",
            "/v1/payments/captured",
            &admin(),
            Some(json!({"order_id": id, "amount": 150_000})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(captured["applied"], true);

        let (status, view) = send(&app, "GET", &format!("/v1/orders/{id}"), &token("seller", seller), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["status"], "held");
        assert_eq!(view["buyer_contact"]["name"]["value"], "Ada");
        assert_eq!(view["buyer_contact"]["address"]["value"], "1 Hall Rd");
        assert_eq!(view["buyer_contact"]["phone"]["visible"], false);
        assert_eq!(view["buyer_contact"]["phone"]["value"], "[REDACTED]");
    }

    #[tokio::test]
    async fn stranger_cannot_read_order() {
        let h = Harness::new();
        let app = h.app();
        let (status, created) = send(
            &app,
            "POST",
            "/v1/orders",
            &token("buyer", Uuid::new_v4()),
            Some(order_body(Uuid::new_v4(), 1_000)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap();
        let (status, body) = send(
            &app,
            "GET",
            &format!("/v1/orders/{id}"),
            &token("buyer", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn release_with_stale_version_conflicts_and_duplicate_is_noop() {
        let h = Harness::new();
        let app = h.app();
        let (buyer, seller) = (Uuid::new_v4(), Uuid::new_v4());
        let (_, created) = send(
            &app,
            "POST",
            "/v1/orders",
            &token("buyer", buyer),
            Some(order_body(seller, 20_000)),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        let (_, captured) = send(
            &app,
            "POST",
            "/v1/payments/captured",
            &admin(),
            Some(json!({"order_id": id, "amount": 20_000})),
        )
        .await;
        let version = captured["order"]["version"].as_u64().unwrap();
        let uri = format!("/v1/orders/{id}/release");

        let (status, body) = send(
            &app,
            "POST",
            &uri,
            &token("buyer", buyer),
            Some(json!({"expected_version": version + 7, "trigger": "buyer_confirmed"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let release = json!({"expected_version": version, "trigger": "pickup_confirmed"});
        let (status, body) = send(&app, "POST", &uri, &token("buyer", buyer), Some(release.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], true);
        assert_eq!(body["order"]["status"], "released");

        let (status, body) = send(&app, "POST", &uri, &token("buyer", buyer), Some(release)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], false);

        let (_, wallet) = send(&app, "GET", &format!("/v1/wallets/{seller}"), &token("seller", seller), None).await;
        assert_eq!(wallet["available"], 18_000);
        assert_eq!(wallet["pending"], 0);
    }

    #[tokio::test]
    async fn seller_cannot_force_release() {
        let h = Harness::new();
        let app = h.app();
        let (buyer, seller) = (Uuid::new_v4(), Uuid::new_v4());
        let (_, created) = send(
            &app,
            "POST",
            "/v1/orders",
            &token("buyer", buyer),
            Some(order_body(seller, 5_000)),
        )
        .await;
        let id = created["id"].as_str().unwrap();
        let (status, _) = send(
            &app,
            "POST",
            &format!("/v1/orders/{id}/release"),
            &token("seller", seller),
            Some(json!({"expected_version": 0, "trigger": "admin_override"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn delivery_trigger_on_pickup_order_is_rejected() {
        let h = Harness::new();
        let app = h.app();
        let buyer = Uuid::new_v4();
        let (_, created) = send(
            &app,
            "POST",
            "/v1/orders",
            &token("buyer", buyer),
            Some(order_body(Uuid::new_v4(), 5_000)),
        )
        .await;
        let id = created["id"].as_str().unwrap();
        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/orders/{id}/release"),
            &token("buyer", buyer),
            Some(json!({"expected_version": 0, "trigger": "delivery_confirmed"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn releasing_unpaid_order_is_invariant_violation() {
        let h = Harness::new();
        let app = h.app();
        let (_, created) = send(
            &app,
            "POST",
            "/v1/orders",
            &admin(),
            Some({
                let mut b = order_body(Uuid::new_v4(), 5_000);
                b["buyer_id"] = json!(Uuid::new_v4());
                b
            }),
        )
        .await;
        let id = created["id"].as_str().unwrap();
        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/orders/{id}/release"),
            &admin(),
            Some(json!({"expected_version": 0, "trigger": "admin_override"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "ESCROW_INVARIANT_VIOLATION");
    }

    #[tokio::test]
    async fn admin_must_name_buyer() {
        let h = Harness::new();
        let (status, _) = send(
            &h.app(),
            "POST",
            "/v1/orders",
            &admin(),
            Some(order_body(Uuid::new_v4(), 5_000)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let h = Harness::new();
        let (status, body) = send(
            &h.app(),
            "POST",
            "/v1/orders",
            &token("buyer", Uuid::new_v4()),
            Some(json!({"amount": "lots"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn capture_with_wrong_amount_is_rejected() {
        let h = Harness::new();
        let app = h.app();
        let (_, created) = send(
            &app,
            "POST",
            "/v1/orders",
            &token("buyer", Uuid::new_v4()),
            Some(order_body(Uuid::new_v4(), 5_000)),
        )
        .await;
        let id = created["id"].as_str().unwrap();
        let (status, _) = send(
            &app,
            "POST",
            "/v1/payments/captured",
            &admin(),
            Some(json!({"order_id": id, "amount": 4_999})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn dispute_stands_when_task_cannot_be_reopened() {
        let h = Harness::new();
        let app = h.app();
        let (buyer, seller) = (Uuid::new_v4(), Uuid::new_v4());
        let (_, created) = send(
            &app,
            "POST",
            "/v1/orders",
            &token("buyer", buyer),
            Some(order_body(seller, 40_000)),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        let (_, captured) = send(
            &app,
            "POST",
            "/v1/payments/captured",
            &admin(),
            Some(json!({"order_id": id, "amount": 40_000})),
        )
        .await;
        let version = captured["order"]["version"].as_u64().unwrap();

        // A task still pending has no path to re-verification.
        let (status, task) = send(
            &app,
            "POST",
            "/v1/tasks",
            &admin(),
            Some(json!({"lat": 6.5158, "lng": 3.3707, "commission_amount": 2_000})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let task_id = task["id"].as_str().unwrap().to_string();

        let (status, dispute) = send(
            &app,
            "POST",
            &format!("/v1/orders/{id}/disputes"),
            &token("buyer", buyer),
            Some(json!({"expected_version": version, "reason": "room is not as listed", "task_id": task_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(dispute["status"], "pending");

        let (_, order) = send(&app, "GET", &format!("/v1/orders/{id}"), &token("buyer", buyer), None).await;
        assert_eq!(order["status"], "disputed");
        let (_, task) = send(&app, "GET", &format!("/v1/tasks/{task_id}"), &admin(), None).await;
        assert_eq!(task["status"], "pending");
    }
}
