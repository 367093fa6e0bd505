//! # campus-api — HTTP Surface for the Trust Engine
//!
//! Wraps the escrow ledger, dispute adjudication, proximity gate and field
//! audit services in an Axum router. Callers authenticate with a bearer
//! token that binds a role (`buyer`, `seller`, `agent`, `admin`) and,
//! for non-admins, a subject id.
//!
//! ## API Surface
//!
//! | Prefix                  | Module                  | Domain                       |
//! |-------------------------|-------------------------|------------------------------|
//! | `/v1/orders/*`          | [`routes::orders`]      | Escrow orders                |
//! | `/v1/payments/captured` | [`routes::orders`]      | Payment collaborator events  |
//! | `/v1/disputes/*`        | [`routes::disputes`]    | Dispute adjudication         |
//! | `/v1/wallets/*`         | [`routes::wallets`]     | Wallet balances              |
//! | `/v1/tasks/*`           | [`routes::tasks`]       | Verification tasks           |
//! | `/v1/proximity/*`       | [`routes::proximity`]   | Proximity gate sessions      |
//! | `/v1/audits/*`          | [`routes::audits`]      | Field audit drafts           |
//! | `/v1/bank/resolve`      | [`routes::bank`]        | Payout account lookup        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated by utoipa derive macros, served at `/openapi.json`.

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::orders::router())
        .merge(routes::disputes::router())
        .merge(routes::wallets::router())
        .merge(routes::tasks::router())
        .merge(routes::proximity::router())
        .merge(routes::audits::router())
        .merge(routes::bank::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe.
async fn readiness() -> &'static str {
    "ready"
}
