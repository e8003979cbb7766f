use thiserror::Error;

/// Domain-level errors the CAT engine can surface on its own.
///
/// Per the propagation policy, the engine never raises storage or transport
/// errors — those originate and are translated at their own boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatError {
    #[error("item {item_id} was never served in session {session_id}")]
    ItemNotServed { session_id: i64, item_id: i64 },

    #[error("item {item_id} already answered in session {session_id}")]
    DuplicateResponse { session_id: i64, item_id: i64 },

    #[error("session {session_id} is not in adaptive mode")]
    NotAdaptive { session_id: i64 },

    #[error("session {session_id} is already terminal")]
    SessionTerminal { session_id: i64 },

    #[error("answer must not be empty")]
    EmptyAnswer,

    #[error("latency must be non-negative, got {0}")]
    NegativeLatency(f64),

    #[error("no eligible items remain")]
    ItemPoolExhausted,

    #[error("item {item_id} has no calibrated IRT parameters")]
    ItemNotCalibrated { item_id: i64 },
}
