//! HTTP handlers, one module per surface area. Each handler
//! does exactly three things: pull what it needs out of `AppState` and the
//! request, call into the domain crates, and translate the result into a
//! DTO. Nothing here re-implements domain logic the lower crates already
//! own -- the CAT engine's own validation order (terminal -> not-adaptive ->
//! duplicate -> not-pending) is trusted as-is, not duplicated.

pub mod admin;
pub mod auth;
pub mod session;
