//! Auth endpoints: register, login, refresh, logout,
//! logout-all, and the password-reset pair.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;

use aiq_auth::gateway::AuthGateway;
use aiq_auth::token::TokenType;
use aiq_auth::{password, AuthError};
use aiq_core::{Demographics, User};

use crate::dto::{
    AuthResponse, GenericMessage, LoginRequest, LogoutRequest, RefreshResponse, RegisterRequest,
    RequestPasswordResetRequest, ResetPasswordRequest, UserDto,
};
use crate::error::ApiError;
use crate::middleware::{bearer_token, AuthenticatedUser};
use crate::state::AppState;

fn peer_ip(headers: &HeaderMap) -> String {
    headers
        .get(aiq_ratelimit::TRUSTED_EDGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    if !password::is_strong_enough(&req.password) {
        return Err(AuthError::WeakPassword.into());
    }
    let hash = password::hash_password(&req.password)?;

    let now = Utc::now();
    let user = User {
        id: 0,
        email: req.email,
        password_hash: hash,
        first_name: req.first_name,
        last_name: req.last_name,
        demographics: Demographics::default(),
        token_revoked_before: None,
        push_token: None,
        push_enabled: false,
        created_at: now,
    };
    let user = state.user_directory.create(user).await?;
    state.audit.log_account_created(user.id);

    let (access, refresh) = state.token_issuer.issue_pair(user.id, &user.email, now)?;
    let _ = peer_ip(&headers);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "bearer",
            user: UserDto::from(&user),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let ip = peer_ip(&headers);
    let user = state.user_directory.find_by_email(&req.email).await?;
    let user = match user {
        Some(u) if password::verify_password(&req.password, &u.password_hash) => u,
        _ => {
            state.audit.log_login_failure(&req.email, &ip);
            return Err(AuthError::InvalidCredentials.into());
        }
    };
    state.audit.log_login_success(&user.email, &ip);

    let now = Utc::now();
    let (access, refresh) = state.token_issuer.issue_pair(user.id, &user.email, now)?;
    Ok(Json(AuthResponse {
        access_token: access.token,
        refresh_token: refresh.token,
        token_type: "bearer",
        user: UserDto::from(&user),
    }))
}

/// Takes the refresh token as the bearer credential, same as every other
/// authenticated route, rather than a JSON body field. Rotates
/// the refresh token: the one presented is blacklisted immediately so it
/// cannot be replayed.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::new(crate::error::ErrorKind::Authentication, "missing_token", "missing bearer token"))?;
    let ip = peer_ip(&headers);
    let now = Utc::now();

    let gateway = AuthGateway::new(&state.token_issuer, &state.blacklist, &state.audit);
    let user = gateway
        .authenticate(token, TokenType::Refresh, &ip, &state.user_lookup(), now)
        .await?;

    if let Some(claims) = state.token_issuer.decode(token) {
        state.blacklist.revoke(&claims.jti, claims_expiry(&claims), now).await;
        state.audit.log_token_revocation(user.id, &claims.jti);
    }

    let (access, new_refresh) = state.token_issuer.issue_pair(user.id, &user.email, now)?;
    Ok(Json(RefreshResponse {
        access_token: access.token,
        refresh_token: new_refresh.token,
        token_type: "bearer",
    }))
}

fn claims_expiry(claims: &aiq_auth::token::Claims) -> chrono::DateTime<Utc> {
    chrono::DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now)
}

/// Revokes the access token used to authenticate this request, plus the
/// refresh token in the body if the caller supplies one. Logging out does
/// not advance the user's revocation epoch -- that is `logout-all`'s job.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    AuthenticatedUser(user): AuthenticatedUser,
    body: Option<Json<LogoutRequest>>,
) -> Result<StatusCode, ApiError> {
    let now = Utc::now();
    if let Some(token) = bearer_token(&headers) {
        if let Some(claims) = state.token_issuer.decode(token) {
            state.blacklist.revoke(&claims.jti, claims_expiry(&claims), now).await;
            state.audit.log_token_revocation(user.id, &claims.jti);
        }
    }
    if let Some(Json(req)) = body {
        if let Some(refresh_token) = req.refresh_token {
            if let Some(claims) = state.token_issuer.decode(&refresh_token) {
                state.blacklist.revoke(&claims.jti, claims_expiry(&claims), now).await;
                state.audit.log_token_revocation(user.id, &claims.jti);
            }
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Revokes the access token used to authenticate this request, then advances
/// the user's revocation epoch so every other token issued before now is
/// rejected on its next use.
pub async fn logout_all(
    State(state): State<AppState>,
    headers: HeaderMap,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    let now = Utc::now();
    if let Some(token) = bearer_token(&headers) {
        if let Some(claims) = state.token_issuer.decode(token) {
            state.blacklist.revoke(&claims.jti, claims_expiry(&claims), now).await;
            state.audit.log_token_revocation(user.id, &claims.jti);
        }
    }
    state.user_directory.advance_revocation(user.id, now).await?;
    state.audit.log_token_revocation(user.id, "all");
    Ok(StatusCode::NO_CONTENT)
}

/// Always returns the same generic response whether or not the email is
/// registered, so this endpoint cannot be used to enumerate accounts.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<RequestPasswordResetRequest>,
) -> Result<Json<GenericMessage>, ApiError> {
    state.audit.log_password_reset_initiated(&req.email);
    if let Some(user) = state.user_directory.find_by_email(&req.email).await? {
        state.reset_tokens.issue(user.id, Utc::now()).await;
    }
    Ok(Json(GenericMessage {
        message: "if that email is registered, a reset link has been sent",
    }))
}

/// Consumes a reset token: sets the new password hash, marks the token
/// used, and advances the revocation epoch so every outstanding session is
/// logged out.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<GenericMessage>, ApiError> {
    let now = Utc::now();
    let token = state
        .reset_tokens
        .find(&req.token)
        .await?
        .filter(|t| t.is_valid(now))
        .ok_or_else(|| {
            state.audit.log_password_reset_failed("invalid_or_expired_token");
            ApiError::validation("invalid_reset_token", "reset token is invalid or expired")
        })?;

    if !password::is_strong_enough(&req.new_password) {
        return Err(AuthError::WeakPassword.into());
    }
    let hash = password::hash_password(&req.new_password)?;

    state.user_directory.update_password_hash(token.user_id, hash).await?;
    state.reset_tokens.mark_used(&token.token).await?;
    state.user_directory.advance_revocation(token.user_id, now).await?;
    state.audit.log_password_reset_completed(token.user_id);

    Ok(Json(GenericMessage { message: "password has been reset" }))
}
