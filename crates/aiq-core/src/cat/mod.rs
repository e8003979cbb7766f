//! Computerized adaptive testing: the 2PL model, EAP estimation, content-
//! balanced maximum-information selection, stopping rules, score conversion,
//! and the engine that composes them.

pub mod eap;
pub mod engine;
pub mod irt;
pub mod result;
pub mod selection;
pub mod stopping;

pub use eap::{AbilityEstimate, ScoredResponse};
pub use engine::{process_response, Outcome, StoppingRules};
pub use result::{DomainScore, TestResult};
pub use selection::Candidate;
