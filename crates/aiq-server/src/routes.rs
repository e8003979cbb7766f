//! Router assembly: wires every handler under its path, layers
//! rate-limit admission in front of the whole surface, and exposes a plain
//! health probe the skip-list (`AppState::new`) already exempts from
//! admission.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{admin, auth, session};
use crate::middleware;
use crate::state::AppState;

async fn health() -> axum::http::StatusCode {
    middleware::HEALTH_OK
}

pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/auth/register", post(auth::register))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/refresh", post(auth::refresh))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/v1/auth/logout-all", post(auth::logout_all))
        .route("/v1/auth/request-password-reset", post(auth::request_password_reset))
        .route("/v1/auth/reset-password", post(auth::reset_password))
        .route("/v1/test/start", post(session::start))
        .route("/v1/test/next", post(session::next))
        .route("/v1/test/submit", post(session::submit))
        .route("/v1/admin/reliability", get(admin::reliability))
        .route("/v1/admin/reliability/history", get(admin::reliability_history))
        .route(
            "/v1/admin/anchor-items",
            get(admin::list_anchor_items).post(admin::toggle_anchor_item),
        )
        .route("/v1/admin/anchor-items/auto-select", post(admin::auto_select_anchor_items))
        .route("/v1/admin/security/logout-all-events", get(admin::logout_all_events))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit))
        .with_state(state)
}
