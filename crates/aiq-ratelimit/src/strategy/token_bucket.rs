//! Token-bucket admission: a bucket refills continuously at `limit / window`
//! tokens per second and each request spends one token.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBucketState {
    pub level: f64,
    pub last_refill: DateTime<Utc>,
}

impl TokenBucketState {
    fn fresh(capacity: u32, now: DateTime<Utc>) -> Self {
        Self {
            level: capacity as f64,
            last_refill: now,
        }
    }
}

/// Returns `(allowed, new_state)`. `capacity` is the bucket size (the
/// window's request limit); `window_seconds` sets the refill rate so the
/// bucket fully empties and refills over one window at sustained load.
pub fn check(
    state: Option<TokenBucketState>,
    capacity: u32,
    window_seconds: u32,
    now: DateTime<Utc>,
) -> (bool, TokenBucketState) {
    let mut state = state.unwrap_or_else(|| TokenBucketState::fresh(capacity, now));

    let elapsed = (now - state.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
    let refill_rate = capacity as f64 / window_seconds.max(1) as f64;
    state.level = (state.level + elapsed * refill_rate).min(capacity as f64);
    state.last_refill = now;

    if state.level >= 1.0 {
        state.level -= 1.0;
        (true, state)
    } else {
        (false, state)
    }
}

/// Remaining whole tokens and the moment the next token becomes available,
/// read without mutating state (used for response headers after admission).
pub fn remaining_and_reset(
    state: &TokenBucketState,
    capacity: u32,
    window_seconds: u32,
) -> (u32, DateTime<Utc>) {
    let remaining = state.level.floor().max(0.0) as u32;
    let refill_rate = capacity as f64 / window_seconds.max(1) as f64;
    let reset_at = if state.level >= 1.0 || refill_rate <= 0.0 {
        state.last_refill
    } else {
        let seconds_needed = ((1.0 - state.level) / refill_rate).ceil().max(0.0);
        state.last_refill + Duration::seconds(seconds_needed as i64)
    };
    (remaining, reset_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_is_admitted_from_a_full_bucket() {
        let now = Utc::now();
        let (allowed, _) = check(None, 3, 60, now);
        assert!(allowed);
    }

    #[test]
    fn exhausts_after_capacity_requests_with_no_elapsed_time() {
        let now = Utc::now();
        let mut state = None;
        for _ in 0..3 {
            let (allowed, new_state) = check(state, 3, 60, now);
            assert!(allowed);
            state = Some(new_state);
        }
        let (allowed, _) = check(state, 3, 60, now);
        assert!(!allowed);
    }

    #[test]
    fn refills_over_time() {
        let now = Utc::now();
        let mut state = None;
        for _ in 0..3 {
            let (_, new_state) = check(state, 3, 60, now);
            state = Some(new_state);
        }
        let later = now + Duration::seconds(60);
        let (allowed, _) = check(state, 3, 60, later);
        assert!(allowed);
    }
}
