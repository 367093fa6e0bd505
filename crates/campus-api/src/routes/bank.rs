//! # Bank Account Lookup
//!
//! Resolves the holder's name for a payout account so a seller can confirm
//! it before saving. Display only: the result is never stored and never
//! affects escrow.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Look up an account holder.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveAccountRequest {
    #[schema(example = "058")]
    pub bank_code: String,
    #[schema(example = "0123456789")]
    pub account_number: String,
}

impl Validate for ResolveAccountRequest {
    fn validate(&self) -> Result<(), String> {
        if self.bank_code.trim().is_empty() || self.account_number.trim().is_empty() {
            return Err("bank_code and account_number are required".into());
        }
        Ok(())
    }
}

/// The resolved holder.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResolveAccountResponse {
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

/// Build the bank router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/bank/resolve", post(resolve_account))
}

/// POST /v1/bank/resolve — Resolve a payout account's holder name.
#[utoipa::path(
    post,
    path = "/v1/bank/resolve",
    request_body = ResolveAccountRequest,
    responses(
        (status = 200, description = "Account holder", body = ResolveAccountResponse),
        (status = 404, description = "No such account", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed bank code or account number", body = crate::error::ErrorBody),
        (status = 503, description = "Resolver unavailable or not configured", body = crate::error::ErrorBody),
    ),
    tag = "bank"
)]
pub async fn resolve_account(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ResolveAccountRequest>, JsonRejection>,
) -> Result<Json<ResolveAccountResponse>, AppError> {
    require_role(&caller, &[Role::Seller])?;
    let req = extract_validated_json(body)?;
    let bank = state.bank.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("bank resolver is not configured".into())
    })?;
    let account = bank
        .resolve_account(req.bank_code.trim(), req.account_number.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("no account matches that bank code and number".into()))?;
    Ok(Json(ResolveAccountResponse {
        bank_code: account.bank_code,
        account_number: account.account_number,
        account_name: account.account_name,
    }))
}
