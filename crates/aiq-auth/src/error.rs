use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid or malformed token")]
    InvalidToken,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("token type mismatch: expected {expected}")]
    WrongTokenType { expected: &'static str },

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("token payload missing required claim: {0}")]
    MissingClaim(&'static str),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("email already registered")]
    EmailExists,

    #[error("password does not meet strength requirements")]
    WeakPassword,

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("token store unavailable: {0}")]
    StoreUnavailable(String),
}
