//! HTTP dispatcher: thin handlers over the domain crates, composed into an
//! axum `Router<AppState>` by `routes::build`. Business logic lives in
//! `aiq-core`/`aiq-auth`/`aiq-store`/`aiq-ratelimit`/`aiq-calibration`; this
//! crate only deserializes requests, calls into those crates, and
//! translates the result into an HTTP response.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod settings;
pub mod state;

pub use error::{ApiError, ErrorKind};
pub use settings::Settings;
pub use state::AppState;
