//! Sliding-window admission: keeps a timestamp per request within the last
//! `window_seconds` and admits while the count stays under `limit`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlidingWindowState {
    pub timestamps: Vec<DateTime<Utc>>,
}

/// Returns `(allowed, new_state)`, with timestamps older than the window
/// pruned before the admission check.
pub fn check(
    state: Option<SlidingWindowState>,
    limit: u32,
    window_seconds: u32,
    now: DateTime<Utc>,
) -> (bool, SlidingWindowState) {
    let mut state = state.unwrap_or_default();
    let cutoff = now - Duration::seconds(window_seconds as i64);
    state.timestamps.retain(|ts| *ts > cutoff);

    if (state.timestamps.len() as u32) < limit {
        state.timestamps.push(now);
        (true, state)
    } else {
        (false, state)
    }
}

/// Remaining admissions and the moment the oldest timestamp falls out of
/// the window (when a slot reopens), read without mutating state.
pub fn remaining_and_reset(
    state: &SlidingWindowState,
    limit: u32,
    window_seconds: u32,
    now: DateTime<Utc>,
) -> (u32, DateTime<Utc>) {
    let used = state.timestamps.len() as u32;
    let remaining = limit.saturating_sub(used);
    let reset_at = state
        .timestamps
        .iter()
        .min()
        .map(|oldest| *oldest + Duration::seconds(window_seconds as i64))
        .unwrap_or(now);
    (remaining, reset_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit() {
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
    fn old_timestamps_fall_out_of_the_window() {
        let now = Utc::now();
        let mut state = None;
        for _ in 0..3 {
            let (_, new_state) = check(state, 3, 60, now);
            state = Some(new_state);
        }
        let later = now + Duration::seconds(61);
        let (allowed, _) = check(state, 3, 60, later);
        assert!(allowed);
    }
}
