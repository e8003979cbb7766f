//! The rate limiter itself: composes an [`Identity`], a [`Strategy`], and a
//! [`RateLimitStore`] into one admission check, with per-endpoint overrides
//! and fail-open semantics when the store errors.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::key::Identity;
use crate::storage::RateLimitStore;
use crate::strategy::{self, Strategy};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    pub limit: u32,
    pub window_seconds: u32,
}

/// Outcome of an admission check: whether the request was let through plus
/// the budget/reset values a caller surfaces as `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl Decision {
    fn bypass(limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            remaining: limit,
            reset_at: now,
        }
    }
}

pub struct RateLimiter<S: RateLimitStore> {
    store: S,
    strategy: Strategy,
    default_policy: Policy,
    endpoint_overrides: HashMap<String, Policy>,
    skip_list: HashSet<String>,
    enabled: bool,
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: S, strategy: Strategy, default_policy: Policy, enabled: bool) -> Self {
        Self {
            store,
            strategy,
            default_policy,
            endpoint_overrides: HashMap::new(),
            skip_list: HashSet::new(),
            enabled,
        }
    }

    pub fn with_endpoint_override(mut self, endpoint: impl Into<String>, policy: Policy) -> Self {
        self.endpoint_overrides.insert(endpoint.into(), policy);
        self
    }

    /// Endpoints that bypass rate limiting entirely (health checks, docs).
    pub fn with_skip_list<I, T>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.skip_list.extend(endpoints.into_iter().map(Into::into));
        self
    }

    fn policy_for(&self, endpoint: &str) -> Policy {
        self.endpoint_overrides
            .get(endpoint)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Runs the admission check. When disabled entirely, on the skip-list,
    /// or on a storage error, always admits -- an unreachable shared cache
    /// must not become an outage.
    pub async fn check(&self, identity: &Identity, endpoint: &str, now: DateTime<Utc>) -> Decision {
        let policy = self.policy_for(endpoint);

        if !self.enabled || self.skip_list.contains(endpoint) {
            return Decision::bypass(policy.limit, now);
        }

        let key = format!("{}:{}", endpoint, identity.key());

        let current_state = match self.store.get(&key).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "rate limit store unavailable, failing open");
                return Decision::bypass(policy.limit, now);
            }
        };

        let (allowed, new_state) = strategy::evaluate(
            self.strategy,
            current_state,
            policy.limit,
            policy.window_seconds,
            now,
        );
        let (remaining, reset_at) =
            strategy::remaining_and_reset(self.strategy, &new_state, policy.limit, policy.window_seconds, now);

        if let Err(e) = self.store.set(&key, new_state).await {
            tracing::warn!(key = %key, error = %e, "rate limit store unavailable, failing open");
            return Decision::bypass(policy.limit, now);
        }

        Decision {
            allowed,
            remaining,
            reset_at,
        }
    }
}
