//! Reliability metrics history: Cronbach's alpha,
//! test-retest, and split-half estimates produced by each calibration run,
//! kept as a timestamped series for trend reporting.

use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliabilitySnapshot {
    pub computed_at: DateTime<Utc>,
    pub cronbach_alpha: Option<f64>,
    pub test_retest: Option<f64>,
    pub split_half_spearman_brown: Option<f64>,
}

pub trait ReliabilityStore: Send + Sync {
    fn record<'a>(
        &'a self,
        snapshot: ReliabilitySnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    fn history<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ReliabilitySnapshot>, StoreError>> + Send + 'a>>;

    fn latest<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ReliabilitySnapshot>, StoreError>> + Send + 'a>>;
}

#[derive(Default)]
pub struct InMemoryReliabilityStore {
    snapshots: RwLock<Vec<ReliabilitySnapshot>>,
}

impl InMemoryReliabilityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReliabilityStore for InMemoryReliabilityStore {
    fn record<'a>(
        &'a self,
        snapshot: ReliabilitySnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.snapshots.write().unwrap().push(snapshot);
            Ok(())
        })
    }

    fn history<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ReliabilitySnapshot>, StoreError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.snapshots.read().unwrap().clone()) })
    }

    fn latest<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ReliabilitySnapshot>, StoreError>> + Send + 'a>>
    {
        Box::pin(async move { Ok(self.snapshots.read().unwrap().last().copied()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latest_returns_the_most_recently_recorded_snapshot() {
        let store = InMemoryReliabilityStore::new();
        let first = ReliabilitySnapshot {
            computed_at: Utc::now(),
            cronbach_alpha: Some(0.7),
            test_retest: None,
            split_half_spearman_brown: None,
        };
        let second = ReliabilitySnapshot {
            computed_at: Utc::now(),
            cronbach_alpha: Some(0.8),
            test_retest: None,
            split_half_spearman_brown: None,
        };
        store.record(first).await.unwrap();
        store.record(second).await.unwrap();
        assert_eq!(store.latest().await.unwrap().unwrap().cronbach_alpha, Some(0.8));
    }

    #[tokio::test]
    async fn latest_is_none_with_no_history() {
        let store = InMemoryReliabilityStore::new();
        assert!(store.latest().await.unwrap().is_none());
    }
}
