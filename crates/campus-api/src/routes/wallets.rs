//! # Wallet API
//!
//! Read-only. Balances change only through escrow transitions.
//! The platform commission wallet is owner `00000000-0000-0000-0000-000000000000`.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use campus_core::OwnerId;
use campus_escrow::Wallet;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::require_party;
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

/// Wallet balances in minor units.
#[derive(Debug, Serialize, ToSchema)]
pub struct WalletResponse {
    pub owner_id: Uuid,
    pub available: i64,
    pub pending: i64,
    pub total_earnings: i64,
    pub is_platform: bool,
}

impl From<Wallet> for WalletResponse {
    fn from(w: Wallet) -> Self {
        Self {
            owner_id: *w.owner_id.as_uuid(),
            available: w.available.minor_units(),
            pending: w.pending.minor_units(),
            total_earnings: w.total_earnings.minor_units(),
            is_platform: w.owner_id.is_platform(),
        }
    }
}

/// Build the wallets router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/wallets/:owner_id", get(get_wallet))
}

/// GET /v1/wallets/{owner_id} — Balances for the owner or an admin.
#[utoipa::path(
    get,
    path = "/v1/wallets/{owner_id}",
    params(("owner_id" = Uuid, Path, description = "Wallet owner ID")),
    responses(
        (status = 200, description = "Wallet balances (zero for unknown owners)", body = WalletResponse),
        (status = 403, description = "Not the owner", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
pub async fn get_wallet(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(owner_id): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    require_party(&caller, &[owner_id])?;
    Ok(Json(state.ledger.wallet(OwnerId::from_uuid(owner_id)).into()))
}
