use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RateLimitError {
    #[error("rate limit storage unavailable: {0}")]
    StorageUnavailable(String),
}
