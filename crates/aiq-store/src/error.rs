use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("item {0} not found")]
    ItemNotFound(i64),

    #[error("response already recorded for session {session_id}, item {item_id}")]
    DuplicateResponse { session_id: i64, item_id: i64 },

    #[error("user {0} already has a session in progress: {1}")]
    SessionAlreadyInProgress(i64, i64),

    #[error("session {0} not found")]
    SessionNotFound(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("email already registered: {0}")]
    EmailExists(String),

    #[error("reset token not found or already used")]
    ResetTokenInvalid,

    #[error("session {session_id} belongs to a different user")]
    SessionOwnedByAnotherUser { session_id: i64 },

    /// A `with_session_locked` mutator rejected the transition. Kept as its
    /// own variant (rather than flattened) so callers can recover the
    /// original domain error for fine-grained API translation.
    #[error(transparent)]
    Cat(#[from] aiq_core::CatError),
}
