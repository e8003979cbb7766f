//! The three selectable admission strategies, unified behind
//! one state enum so the limiter can store and dispatch on a single value.

pub mod fixed_window;
pub mod sliding_window;
pub mod token_bucket;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use fixed_window::FixedWindowState;
pub use sliding_window::SlidingWindowState;
pub use token_bucket::TokenBucketState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    TokenBucket,
    SlidingWindow,
    FixedWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyState {
    TokenBucket(TokenBucketState),
    SlidingWindow(SlidingWindowState),
    FixedWindow(FixedWindowState),
}

/// Dispatches to the strategy named by `strategy`, discarding (and
/// replacing) mismatched state -- this only happens if a deployment
/// switches strategies with live state still in the store.
pub fn evaluate(
    strategy: Strategy,
    state: Option<StrategyState>,
    limit: u32,
    window_seconds: u32,
    now: DateTime<Utc>,
) -> (bool, StrategyState) {
    match strategy {
        Strategy::TokenBucket => {
            let current = match state {
                Some(StrategyState::TokenBucket(s)) => Some(s),
                _ => None,
            };
            let (allowed, new_state) = token_bucket::check(current, limit, window_seconds, now);
            (allowed, StrategyState::TokenBucket(new_state))
        }
        Strategy::SlidingWindow => {
            let current = match state {
                Some(StrategyState::SlidingWindow(s)) => Some(s),
                _ => None,
            };
            let (allowed, new_state) = sliding_window::check(current, limit, window_seconds, now);
            (allowed, StrategyState::SlidingWindow(new_state))
        }
        Strategy::FixedWindow => {
            let current = match state {
                Some(StrategyState::FixedWindow(s)) => Some(s),
                _ => None,
            };
            let (allowed, new_state) = fixed_window::check(current, limit, window_seconds, now);
            (allowed, StrategyState::FixedWindow(new_state))
        }
    }
}

/// Remaining budget and reset instant for an already-computed state,
/// dispatched by strategy. Falls back to `(limit, now)` if the state
/// variant doesn't match (shouldn't happen; `evaluate` always writes the
/// matching variant).
pub fn remaining_and_reset(
    strategy: Strategy,
    state: &StrategyState,
    limit: u32,
    window_seconds: u32,
    now: DateTime<Utc>,
) -> (u32, DateTime<Utc>) {
    match (strategy, state) {
        (Strategy::TokenBucket, StrategyState::TokenBucket(s)) => {
            token_bucket::remaining_and_reset(s, limit, window_seconds)
        }
        (Strategy::SlidingWindow, StrategyState::SlidingWindow(s)) => {
            sliding_window::remaining_and_reset(s, limit, window_seconds, now)
        }
        (Strategy::FixedWindow, StrategyState::FixedWindow(s)) => {
            fixed_window::remaining_and_reset(s, limit, window_seconds)
        }
        _ => (limit, now),
    }
}
