//! Per-identity request admission: a trusted identity key,
//! one of three selectable strategies, and a pluggable store, composed
//! into a limiter with per-endpoint overrides and fail-open semantics.

pub mod error;
pub mod key;
pub mod limiter;
pub mod remote;
pub mod storage;
pub mod strategy;

pub use error::RateLimitError;
pub use key::{resolve_identity, Identity, TRUSTED_EDGE_HEADER};
pub use limiter::{Decision, Policy, RateLimiter};
pub use remote::RemoteStore;
pub use storage::{InMemoryStore, RateLimitStore};
pub use strategy::Strategy;
