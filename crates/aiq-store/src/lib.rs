//! In-process repository implementations: one module per component named
//! in the component design, each a narrow trait plus an in-memory backend,
//! so the CAT engine and dispatcher stay testable without any persistence
//! at all.

pub mod error;
pub mod item_bank;
pub mod reliability_store;
pub mod reset_token_store;
pub mod response_log;
pub mod session_store;
pub mod user_directory;

pub use error::StoreError;
pub use item_bank::{InMemoryItemBank, ItemBank, ItemQuery};
pub use reliability_store::{InMemoryReliabilityStore, ReliabilitySnapshot, ReliabilityStore};
pub use reset_token_store::{InMemoryResetTokenStore, ResetTokenStore};
pub use response_log::{CalibrationTuple, InMemoryResponseLog, ResponseLog};
pub use session_store::{InMemorySessionStore, SessionStore};
pub use user_directory::{InMemoryUserDirectory, UserDirectory};
