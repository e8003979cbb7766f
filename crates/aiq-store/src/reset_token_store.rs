//! Password reset token persistence: caps live tokens per
//! user and invalidates the oldest when a new one is issued past the cap.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use aiq_auth::reset::{tokens_to_evict, ResetToken};
use chrono::{DateTime, Utc};

use crate::error::StoreError;

pub trait ResetTokenStore: Send + Sync {
    fn store<'a>(
        &'a self,
        token: ResetToken,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Returns `None` for an unknown, evicted, or expired-and-purged token.
    /// An evicted token is never returned here even though it still shows
    /// up in `list_for_user`.
    fn find<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ResetToken>, StoreError>> + Send + 'a>>;

    fn mark_used<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Every token ever issued to `user_id`, for the admin forensic view
    /// that correlates password resets with logout-all events.
    fn list_for_user<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ResetToken>, StoreError>> + Send + 'a>>;
}

#[derive(Default)]
pub struct InMemoryResetTokenStore {
    tokens: RwLock<HashMap<String, ResetToken>>,
}

impl InMemoryResetTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (unused, unexpired) tokens for `user_id`, oldest first.
    fn live_for_user(&self, user_id: i64, now: DateTime<Utc>) -> Vec<ResetToken> {
        let mut live: Vec<ResetToken> = self
            .tokens
            .read()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id && t.is_valid(now))
            .cloned()
            .collect();
        live.sort_by_key(|t| t.issued_at);
        live
    }

    /// Evicts the oldest live tokens for `user_id` to make room for a new
    /// one, then stores it. Eviction flips `evicted` rather than removing
    /// the entry, so the forensic history in `list_for_user` stays intact.
    pub async fn issue(&self, user_id: i64, now: DateTime<Utc>) -> ResetToken {
        let live = self.live_for_user(user_id, now);
        let evicted = tokens_to_evict(&live);
        {
            let mut tokens = self.tokens.write().unwrap();
            for jti in &evicted {
                if let Some(t) = tokens.get_mut(jti) {
                    t.evicted = true;
                }
            }
        }
        let fresh = aiq_auth::reset::generate(user_id, now);
        self.store(fresh.clone()).await.unwrap();
        fresh
    }
}

impl ResetTokenStore for InMemoryResetTokenStore {
    fn store<'a>(
        &'a self,
        token: ResetToken,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.tokens.write().unwrap().insert(token.token.clone(), token);
            Ok(())
        })
    }

    fn find<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ResetToken>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(self
                .tokens
                .read()
                .unwrap()
                .get(token)
                .filter(|t| !t.evicted)
                .cloned())
        })
    }

    fn mark_used<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut tokens = self.tokens.write().unwrap();
            match tokens.get_mut(token) {
                Some(t) => {
                    t.used = true;
                    Ok(())
                }
                None => Err(StoreError::ResetTokenInvalid),
            }
        })
    }

    fn list_for_user<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ResetToken>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(self
                .tokens
                .read()
                .unwrap()
                .values()
                .filter(|t| t.user_id == user_id)
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiq_auth::reset::MAX_LIVE_TOKENS_PER_USER;

    #[tokio::test]
    async fn issuing_past_the_cap_evicts_the_oldest() {
        let store = InMemoryResetTokenStore::new();
        let now = Utc::now();
        let mut first = None;
        for i in 0..MAX_LIVE_TOKENS_PER_USER {
            let issued = store.issue(1, now + chrono::Duration::seconds(i as i64)).await;
            if i == 0 {
                first = Some(issued.token.clone());
            }
        }
        store.issue(1, now + chrono::Duration::seconds(100)).await;
        let first = first.unwrap();
        assert!(store.find(&first).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_for_user_includes_evicted_and_used_tokens() {
        let store = InMemoryResetTokenStore::new();
        let now = Utc::now();
        for i in 0..MAX_LIVE_TOKENS_PER_USER + 1 {
            store.issue(1, now + chrono::Duration::seconds(i as i64)).await;
        }
        let listed = store.list_for_user(1).await.unwrap();
        assert_eq!(listed.len(), MAX_LIVE_TOKENS_PER_USER + 1);
    }

    #[tokio::test]
    async fn mark_used_token_is_no_longer_valid() {
        let store = InMemoryResetTokenStore::new();
        let token = store.issue(1, Utc::now()).await;
        store.mark_used(&token.token).await.unwrap();
        let reloaded = store.find(&token.token).await.unwrap().unwrap();
        assert!(reloaded.used);
    }
}
