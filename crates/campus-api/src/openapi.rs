//! # OpenAPI Document Assembly
//!
//! Collects every utoipa-documented route into one document served at
//! `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI document for the engine's HTTP surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campus Trust Engine API",
        version = "0.3.12",
        description = "Escrow-gated marketplace orders, dispute adjudication, wallets, proximity-gated check-ins and field audit reports.",
        license(name = "BUSL-1.1")
    ),
    paths(
        // Orders
        crate::routes::orders::create_order,
        crate::routes::orders::get_order,
        crate::routes::orders::payment_captured,
        crate::routes::orders::fulfil_order,
        crate::routes::orders::release_funds,
        crate::routes::orders::raise_dispute,
        // Disputes
        crate::routes::disputes::get_dispute,
        crate::routes::disputes::score_dispute,
        crate::routes::disputes::resolve_dispute,
        // Wallets
        crate::routes::wallets::get_wallet,
        // Tasks
        crate::routes::tasks::create_task,
        crate::routes::tasks::get_task,
        crate::routes::tasks::assign_task,
        // Proximity
        crate::routes::proximity::open_session,
        crate::routes::proximity::submit_fix,
        crate::routes::proximity::cancel_session,
        // Audits
        crate::routes::audits::start_audit,
        crate::routes::audits::get_draft,
        crate::routes::audits::update_draft,
        crate::routes::audits::toggle_amenity,
        crate::routes::audits::add_media,
        crate::routes::audits::remove_media,
        crate::routes::audits::submit_audit,
        // Bank
        crate::routes::bank::resolve_account,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        // Order DTOs
        crate::routes::orders::ContactInput,
        crate::routes::orders::CreateOrderRequest,
        crate::routes::orders::PaymentCapturedRequest,
        crate::routes::orders::ReleaseRequest,
        crate::routes::orders::RaiseDisputeRequest,
        crate::routes::orders::OrderResponse,
        crate::routes::orders::TransitionResponse,
        // Dispute DTOs
        crate::routes::disputes::ResolveDisputeRequest,
        crate::routes::disputes::DisputeResponse,
        // Wallet DTOs
        crate::routes::wallets::WalletResponse,
        // Task DTOs
        crate::routes::tasks::AmenityInput,
        crate::routes::tasks::CreateTaskRequest,
        crate::routes::tasks::AssignTaskRequest,
        crate::routes::tasks::TaskResponse,
        // Proximity DTOs
        crate::routes::proximity::OpenSessionRequest,
        crate::routes::proximity::SessionResponse,
        crate::routes::proximity::PositionFixRequest,
        crate::routes::proximity::AttemptResponse,
        crate::routes::proximity::CancelledResponse,
        // Audit DTOs
        crate::routes::audits::StartAuditRequest,
        crate::routes::audits::UpdateDraftRequest,
        crate::routes::audits::AddMediaRequest,
        crate::routes::audits::DraftResponse,
        crate::routes::audits::SubmitResponse,
        // Bank DTOs
        crate::routes::bank::ResolveAccountRequest,
        crate::routes::bank::ResolveAccountResponse,
    )),
    tags(
        (name = "orders", description = "Escrow order lifecycle"),
        (name = "disputes", description = "Dispute scoring and admin resolution"),
        (name = "wallets", description = "Wallet balances"),
        (name = "tasks", description = "Verification task registry"),
        (name = "proximity", description = "Proximity gate sessions"),
        (name = "audits", description = "Field audit drafts and submission"),
        (name = "bank", description = "Payout account name lookup"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
