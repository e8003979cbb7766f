//! Token blacklist: revokes individual tokens by `jti` with a
//! TTL equal to their remaining life.
//!
//! Two backends share one interface: an in-process store for single-worker
//! deployments, and a wrapper that treats any backend error as fail-open
//! (the request proceeds, a warning is emitted) so a degraded shared cache
//! never turns into an outage.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BlacklistError {
    #[error("blacklist backend unavailable: {0}")]
    Unavailable(String),
}

/// Storage backend for revoked token ids. Implementations use
/// `Pin<Box<dyn Future>>` rather than `async_trait` to stay dyn-compatible.
pub trait TokenBlacklist: Send + Sync {
    /// Records `jti` as revoked until `expires_at`. A no-op for a `jti`
    /// whose `expires_at` has already passed.
    fn revoke<'a>(
        &'a self,
        jti: &'a str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlacklistError>> + Send + 'a>>;

    fn is_revoked<'a>(
        &'a self,
        jti: &'a str,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<bool, BlacklistError>> + Send + 'a>>;

    fn backend_name(&self) -> &str;
}

/// In-process backend: a single `Mutex<HashMap>`. Expired entries are
/// treated as absent on lookup rather than swept eagerly; both implicitly
/// decay once their TTL passes.
#[derive(Default)]
pub struct InMemoryBlacklist {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenBlacklist for InMemoryBlacklist {
    fn revoke<'a>(
        &'a self,
        jti: &'a str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlacklistError>> + Send + 'a>> {
        Box::pin(async move {
            if expires_at <= now {
                return Ok(());
            }
            let mut entries = self.entries.lock().unwrap();
            entries.insert(jti.to_string(), expires_at);
            Ok(())
        })
    }

    fn is_revoked<'a>(
        &'a self,
        jti: &'a str,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<bool, BlacklistError>> + Send + 'a>> {
        Box::pin(async move {
            let entries = self.entries.lock().unwrap();
            match entries.get(jti) {
                Some(expires_at) => Ok(*expires_at > now),
                None => Ok(false),
            }
        })
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// Wraps any [`TokenBlacklist`] so backend errors degrade to "not revoked"
/// rather than propagate, per the fail-open policy. Every
/// fail-open event is logged at `warn` for operational visibility.
pub struct FailOpenBlacklist<B: TokenBlacklist> {
    inner: B,
}

impl<B: TokenBlacklist> FailOpenBlacklist<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        if let Err(e) = self.inner.revoke(jti, expires_at, now).await {
            tracing::warn!(jti = %jti, error = %e, "blacklist revoke failed, continuing");
        }
    }

    /// Returns `false` (not revoked) on any backend error, logging a
    /// warning -- a transient outage in the shared cache must not block
    /// authentication.
    pub async fn is_revoked(&self, jti: &str, now: DateTime<Utc>) -> bool {
        match self.inner.is_revoked(jti, now).await {
            Ok(revoked) => revoked,
            Err(e) => {
                tracing::warn!(jti = %jti, error = %e, "blacklist unavailable, failing open");
                false
            }
        }
    }

    pub fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn revoked_token_is_reported_revoked() {
        let store = InMemoryBlacklist::new();
        let now = Utc::now();
        store.revoke("jti-1", now + Duration::minutes(5), now).await.unwrap();
        assert!(store.is_revoked("jti-1", now).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_jti_is_not_revoked() {
        let store = InMemoryBlacklist::new();
        assert!(!store.is_revoked("unknown", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn revocation_is_absorbing_past_its_own_expiry_but_not_beyond() {
        let store = InMemoryBlacklist::new();
        let now = Utc::now();
        store.revoke("jti-1", now + Duration::minutes(1), now).await.unwrap();
        assert!(store.is_revoked("jti-1", now + Duration::seconds(30)).await.unwrap());
        assert!(!store
            .is_revoked("jti-1", now + Duration::minutes(2))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn revoking_an_already_expired_token_is_a_no_op() {
        let store = InMemoryBlacklist::new();
        let now = Utc::now();
        store.revoke("jti-1", now - Duration::minutes(1), now).await.unwrap();
        assert!(!store.is_revoked("jti-1", now).await.unwrap());
    }

    struct AlwaysFailsBlacklist;

    impl TokenBlacklist for AlwaysFailsBlacklist {
        fn revoke<'a>(
            &'a self,
            _jti: &'a str,
            _expires_at: DateTime<Utc>,
            _now: DateTime<Utc>,
        ) -> Pin<Box<dyn Future<Output = Result<(), BlacklistError>> + Send + 'a>> {
            Box::pin(async { Err(BlacklistError::Unavailable("down".into())) })
        }

        fn is_revoked<'a>(
            &'a self,
            _jti: &'a str,
            _now: DateTime<Utc>,
        ) -> Pin<Box<dyn Future<Output = Result<bool, BlacklistError>> + Send + 'a>> {
            Box::pin(async { Err(BlacklistError::Unavailable("down".into())) })
        }

        fn backend_name(&self) -> &str {
            "always-fails"
        }
    }

    #[tokio::test]
    async fn fails_open_when_backend_unavailable() {
        let store = FailOpenBlacklist::new(AlwaysFailsBlacklist);
        assert!(!store.is_revoked("jti-1", Utc::now()).await);
    }
}
