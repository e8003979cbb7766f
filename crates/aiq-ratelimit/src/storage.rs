//! Rate-limit state storage.
//!
//! Write-heavy and contention-sensitive: the in-process backend favors a
//! sharded lock over one global mutex, and a lossy read-modify-write is an
//! accepted tradeoff over a fully serialized one.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::error::RateLimitError;
use crate::strategy::StrategyState;

const SHARD_COUNT: usize = 16;

pub trait RateLimitStore: Send + Sync {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StrategyState>, RateLimitError>> + Send + 'a>>;

    fn set<'a>(
        &'a self,
        key: &'a str,
        state: StrategyState,
    ) -> Pin<Box<dyn Future<Output = Result<(), RateLimitError>> + Send + 'a>>;
}

/// In-process store, sharded by key hash to reduce lock contention under
/// concurrent admission checks from many identities at once.
pub struct InMemoryStore {
    shards: Vec<Mutex<HashMap<String, StrategyState>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard_for(&self, key: &str) -> &Mutex<HashMap<String, StrategyState>> {
        let hash = key.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        &self.shards[hash % self.shards.len()]
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStore for InMemoryStore {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StrategyState>, RateLimitError>> + Send + 'a>> {
        Box::pin(async move {
            let shard = self.shard_for(key).lock().unwrap();
            Ok(shard.get(key).cloned())
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        state: StrategyState,
    ) -> Pin<Box<dyn Future<Output = Result<(), RateLimitError>> + Send + 'a>> {
        Box::pin(async move {
            let mut shard = self.shard_for(key).lock().unwrap();
            shard.insert(key.to_string(), state);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::FixedWindowState;

    #[tokio::test]
    async fn round_trips_state_by_key() {
        let store = InMemoryStore::new();
        let state = StrategyState::FixedWindow(FixedWindowState { epoch: 1, count: 2 });
        store.set("user:1", state.clone()).await.unwrap();
        let loaded = store.get("user:1").await.unwrap();
        assert_eq!(loaded, Some(state));
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("nonexistent").await.unwrap(), None);
    }
}
