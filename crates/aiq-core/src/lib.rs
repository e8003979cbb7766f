//! Domain types and the adaptive-testing engine: item bank records, sessions,
//! responses, users, the 2PL/EAP/selection/stopping machinery, and the
//! person-fit validity analyzer.
//!
//! This crate is storage- and transport-agnostic: it has no notion of a
//! database, a queue, or an HTTP request. Callers (`aiq-store`, `aiq-server`)
//! own persistence and wiring; this crate owns the scoring semantics.

pub mod cat;
pub mod constants;
pub mod error;
pub mod item;
pub mod response;
pub mod session;
pub mod user;
pub mod validity;

pub use error::CatError;
pub use item::{Domain, DifficultyTier, IrtParams, Item, QualityState};
pub use response::Response;
pub use session::{DomainCounts, Session, SessionMode, SessionState, StoppingReason};
pub use user::{Demographics, EducationLevel, User};
pub use validity::{FitFlag, ScorePercentile, ValidityReport};
