//! Password reset tokens.
//!
//! A reset token is the URL-safe base64 encoding of 32 cryptographically
//! random bytes -- opaque, unguessable, and independent of the JWT signing
//! path used for session tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

/// Maximum number of live reset tokens kept per user; issuing a new one
/// past this cap invalidates the oldest to make room.
pub const MAX_LIVE_TOKENS_PER_USER: usize = 3;

pub const RESET_TOKEN_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ResetToken {
    pub token: String,
    pub user_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    /// Set when a later issuance pushed this token past
    /// [`MAX_LIVE_TOKENS_PER_USER`]. An evicted token is never returned by
    /// `find`, but stays in `list_for_user`'s history for the admin
    /// forensic view.
    pub evicted: bool,
}

/// Generates a fresh, unused reset token for `user_id`.
pub fn generate(user_id: i64, now: DateTime<Utc>) -> ResetToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    ResetToken {
        token,
        user_id,
        issued_at: now,
        expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        used: false,
        evicted: false,
    }
}

impl ResetToken {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.evicted && self.expires_at > now
    }
}

/// Given a user's current live (unused, unexpired) tokens in issuance
/// order (oldest first), decides which to drop to stay within
/// [`MAX_LIVE_TOKENS_PER_USER`] before a new one is issued.
pub fn tokens_to_evict(live_tokens: &[ResetToken]) -> Vec<String> {
    if live_tokens.len() < MAX_LIVE_TOKENS_PER_USER {
        return Vec::new();
    }
    let excess = live_tokens.len() + 1 - MAX_LIVE_TOKENS_PER_USER;
    live_tokens
        .iter()
        .take(excess)
        .map(|t| t.token.clone())
        .collect()
}
