//! The single HTTP-shaped error taxonomy. Every domain error
//! converts into an `ApiError` exactly once, at this boundary; nothing
//! downstream of a handler should ever see an `aiq-core`/`aiq-auth`/
//! `aiq-store`/`aiq-ratelimit` error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use aiq_auth::AuthError;
use aiq_core::CatError;
use aiq_ratelimit::RateLimitError;
use aiq_store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Validation,
    Authentication,
    Authorization,
    Conflict,
    NotFound,
    Admission,
    Server,
}

impl ErrorKind {
    fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Admission => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// An HTTP-shaped error: a kind (drives status code), a stable message key
/// the client can branch on, and a human string that never leaks internal
/// identifiers for anything above `Validation`.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message_key: &'static str,
    pub detail: String,
    /// Set on `Admission` so the handler layer can attach `Retry-After` and
    /// `X-RateLimit-*` headers.
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message_key: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            message_key,
            detail: detail.into(),
            retry_after_secs: None,
        }
    }

    pub fn validation(message_key: &'static str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message_key, detail)
    }

    pub fn bad_request(message_key: &'static str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message_key, detail)
    }

    pub fn not_found(message_key: &'static str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message_key, detail)
    }

    pub fn authorization(message_key: &'static str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message_key, detail)
    }

    pub fn admission(retry_after_secs: u64) -> Self {
        Self {
            kind: ErrorKind::Admission,
            message_key: "rate_limited",
            detail: "rate limit exceeded".into(),
            retry_after_secs: Some(retry_after_secs),
        }
    }

    pub fn server(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(error = %detail, "internal error");
        Self::new(ErrorKind::Server, "internal_error", "an internal error occurred")
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        let body = Json(ErrorBody {
            error: self.message_key,
            message: &self.detail,
        });
        let mut response = (status, body).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<CatError> for ApiError {
    fn from(err: CatError) -> Self {
        match err {
            CatError::ItemNotServed { .. } => {
                ApiError::bad_request("item_not_served", err.to_string())
            }
            CatError::DuplicateResponse { .. } => {
                ApiError::new(ErrorKind::Conflict, "duplicate_response", err.to_string())
            }
            CatError::NotAdaptive { .. } => {
                ApiError::bad_request("not_adaptive_session", err.to_string())
            }
            CatError::SessionTerminal { .. } => {
                ApiError::bad_request("session_terminal", err.to_string())
            }
            CatError::EmptyAnswer => ApiError::bad_request("empty_answer", err.to_string()),
            CatError::NegativeLatency(_) => {
                ApiError::bad_request("negative_latency", err.to_string())
            }
            CatError::ItemPoolExhausted => {
                ApiError::validation("item_pool_exhausted", err.to_string())
            }
            CatError::ItemNotCalibrated { .. } => {
                ApiError::validation("item_not_calibrated", err.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => {
                ApiError::new(ErrorKind::Authentication, "invalid_token", err.to_string())
            }
            AuthError::InvalidRefreshToken => {
                ApiError::new(ErrorKind::Authentication, "invalid_token", err.to_string())
            }
            AuthError::WrongTokenType { .. } => ApiError::new(
                ErrorKind::Authentication,
                "invalid_token_type",
                err.to_string(),
            ),
            AuthError::TokenRevoked => {
                ApiError::new(ErrorKind::Authentication, "token_revoked", err.to_string())
            }
            AuthError::MissingClaim(_) => {
                ApiError::new(ErrorKind::Authentication, "invalid_token", err.to_string())
            }
            AuthError::InvalidCredentials => ApiError::new(
                ErrorKind::Authentication,
                "invalid_credentials",
                "invalid email or password",
            ),
            AuthError::UserNotFound => {
                ApiError::new(ErrorKind::Authentication, "invalid_token", err.to_string())
            }
            AuthError::EmailExists => {
                ApiError::new(ErrorKind::Conflict, "email_exists", err.to_string())
            }
            AuthError::WeakPassword => ApiError::validation("weak_password", err.to_string()),
            AuthError::HashError(detail) => ApiError::server(detail),
            AuthError::StoreUnavailable(detail) => ApiError::server(detail),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ItemNotFound(_) => ApiError::not_found("item_not_found", err.to_string()),
            StoreError::DuplicateResponse { .. } => {
                ApiError::new(ErrorKind::Conflict, "duplicate_response", err.to_string())
            }
            StoreError::SessionAlreadyInProgress(_, session_id) => ApiError::new(
                ErrorKind::Conflict,
                "session_already_in_progress",
                format!("a session is already in progress: {session_id}"),
            ),
            StoreError::SessionNotFound(_) => {
                ApiError::not_found("session_not_found", err.to_string())
            }
            StoreError::UserNotFound(_) => ApiError::not_found("user_not_found", err.to_string()),
            StoreError::EmailExists(_) => {
                ApiError::new(ErrorKind::Conflict, "email_exists", err.to_string())
            }
            StoreError::ResetTokenInvalid => {
                ApiError::validation("invalid_reset_token", err.to_string())
            }
            StoreError::SessionOwnedByAnotherUser { .. } => {
                ApiError::authorization("session_owned_by_another_user", err.to_string())
            }
            StoreError::Cat(cat_err) => cat_err.into(),
        }
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        ApiError::server(err.to_string())
    }
}
