//! Fixed-window admission: a counter reset every `window_seconds`-long
//! epoch. Cheapest strategy; accepts boundary bursts as a known tradeoff
//!.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedWindowState {
    pub epoch: i64,
    pub count: u32,
}

fn epoch_for(now: DateTime<Utc>, window_seconds: u32) -> i64 {
    now.timestamp() / window_seconds.max(1) as i64
}

/// Returns `(allowed, new_state)`.
pub fn check(
    state: Option<FixedWindowState>,
    limit: u32,
    window_seconds: u32,
    now: DateTime<Utc>,
) -> (bool, FixedWindowState) {
    let current_epoch = epoch_for(now, window_seconds);
    let mut state = match state {
        Some(s) if s.epoch == current_epoch => s,
        _ => FixedWindowState {
            epoch: current_epoch,
            count: 0,
        },
    };

    if state.count < limit {
        state.count += 1;
        (true, state)
    } else {
        (false, state)
    }
}

/// Remaining admissions in the current epoch and the instant the next
/// epoch begins, read without mutating state.
pub fn remaining_and_reset(
    state: &FixedWindowState,
    limit: u32,
    window_seconds: u32,
) -> (u32, DateTime<Utc>) {
    let remaining = limit.saturating_sub(state.count);
    let window_seconds = window_seconds.max(1) as i64;
    let reset_at = DateTime::from_timestamp((state.epoch + 1) * window_seconds, 0).unwrap_or_else(Utc::now);
    (remaining, reset_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn admits_up_to_the_limit_within_one_window() {
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
    fn new_epoch_resets_the_counter() {
        let now = Utc::now();
        let mut state = None;
        for _ in 0..3 {
            let (_, new_state) = check(state, 3, 60, now);
            state = Some(new_state);
        }
        let next_window = now + Duration::seconds(70);
        let (allowed, _) = check(state, 3, 60, next_window);
        assert!(allowed);
    }
}
