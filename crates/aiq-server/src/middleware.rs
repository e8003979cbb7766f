//! Request-scoped concerns that sit in front of the handlers: rate-limit
//! admission, bearer-token authentication, and the admin-token guard
//!.
//!
//! Both extractors and the rate-limit middleware read the connection's peer
//! address from axum's `ConnectInfo`, never from a client-supplied header --
//! `x-forwarded-for`/`x-real-ip` must never reach `resolve_identity`.

use std::net::SocketAddr;

use aiq_auth::gateway::AuthGateway;
use aiq_auth::token::TokenType;
use aiq_core::User;
use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use aiq_ratelimit::{resolve_identity, Identity, TRUSTED_EDGE_HEADER};

use crate::error::ApiError;
use crate::state::AppState;

fn peer_addr(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

fn trusted_edge_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(TRUSTED_EDGE_HEADER).and_then(|v| v.to_str().ok())
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Rate-limit admission, run as a `from_fn_with_state` layer ahead of every
/// route. Identifies the caller by user id when a bearer token decodes to
/// one (no blacklist check here -- this is a cheap best-effort key, not an
/// authentication decision), falling back to the trusted edge header and
/// then the raw peer address.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();
    let user_id = bearer_token(&parts.headers).and_then(|t| state.token_issuer.decode(t)).map(|c| c.user_id);
    let identity = resolve_identity(
        user_id,
        trusted_edge_header(&parts.headers),
        &peer_addr(&parts),
    );
    let endpoint = parts.uri.path().to_string();
    let now = Utc::now();

    let decision = state.rate_limiter.check(&identity, &endpoint, now).await;
    if !decision.allowed {
        state.audit.log_rate_limit_exceeded(&identity.key(), &endpoint);
        let retry_after = (decision.reset_at - now).num_seconds().max(0) as u64;
        return Err(ApiError::admission(retry_after));
    }

    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}

/// An authenticated principal, extracted from a valid, non-revoked access
/// token. Any handler that takes this as a parameter requires
/// authentication; axum rejects the request before the handler body runs if
/// extraction fails.
pub struct AuthenticatedUser(pub User);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            ApiError::new(
                crate::error::ErrorKind::Authentication,
                "missing_token",
                "missing bearer token",
            )
        })?;

        let ip = peer_addr(parts);
        let gateway = AuthGateway::new(&state.token_issuer, &state.blacklist, &state.audit);
        let user = gateway
            .authenticate(token, TokenType::Access, &ip, &state.user_lookup(), Utc::now())
            .await?;
        Ok(AuthenticatedUser(user))
    }
}

/// Guards the `/v1/admin/*` routes. Compares a client-supplied
/// `X-Admin-Token` header against `Settings.admin_token`; a `None` token in
/// settings means the deployment never unlocked admin access, so every
/// request is rejected.
pub struct AdminGuard;

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get("x-admin-token")
            .and_then(|v| v.to_str().ok());

        let expected = state.settings.admin_token.as_deref();
        match (supplied, expected) {
            (Some(supplied), Some(expected)) if supplied == expected => Ok(AdminGuard),
            _ => Err(ApiError::authorization("admin_token_invalid", "missing or invalid admin token")),
        }
    }
}

/// Not currently used as a tower layer (kept as a plain status constant for
/// the `serve` subcommand's readiness probe, wired directly in `routes.rs`).
pub const HEALTH_OK: StatusCode = StatusCode::OK;
