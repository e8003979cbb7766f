//! Item bank: a read-mostly store of calibrated items, with a
//! transactional bulk-update path for calibration commits so no live
//! request observes a mixed parameter set.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use aiq_core::item::{Domain, DifficultyTier};
use aiq_core::Item;

use crate::error::StoreError;

#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    pub domain: Option<Domain>,
    pub difficulty_tier: Option<DifficultyTier>,
    pub exclude_ids: HashSet<i64>,
}

pub trait ItemBank: Send + Sync {
    fn get<'a>(
        &'a self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Item, StoreError>> + Send + 'a>>;

    fn get_many<'a>(
        &'a self,
        ids: &'a [i64],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, StoreError>> + Send + 'a>>;

    /// Active, normal-quality, calibrated items matching `query`.
    fn query_eligible<'a>(
        &'a self,
        query: &'a ItemQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, StoreError>> + Send + 'a>>;

    /// Replaces the calibrated parameters of every item in `updates` as one
    /// atomic commit.
    fn apply_calibration<'a>(
        &'a self,
        updates: &'a [Item],
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Every item regardless of eligibility, for admin listing. Not used by
    /// the CAT hot path.
    fn list_all<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, StoreError>> + Send + 'a>>;

    /// Flips the anchor designation on a single item.
    fn set_anchor<'a>(
        &'a self,
        id: i64,
        anchor: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Item, StoreError>> + Send + 'a>>;
}

#[derive(Default)]
pub struct InMemoryItemBank {
    items: RwLock<HashMap<i64, Item>>,
}

impl InMemoryItemBank {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().map(|i| (i.id, i)).collect()),
        }
    }
}

impl ItemBank for InMemoryItemBank {
    fn get<'a>(
        &'a self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Item, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.items
                .read()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or(StoreError::ItemNotFound(id))
        })
    }

    fn get_many<'a>(
        &'a self,
        ids: &'a [i64],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let items = self.items.read().unwrap();
            ids.iter()
                .map(|id| items.get(id).cloned().ok_or(StoreError::ItemNotFound(*id)))
                .collect()
        })
    }

    fn query_eligible<'a>(
        &'a self,
        query: &'a ItemQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let items = self.items.read().unwrap();
            Ok(items
                .values()
                .filter(|item| item.eligible_for_serving())
                .filter(|item| query.domain.is_none_or(|d| item.domain == d))
                .filter(|item| {
                    query
                        .difficulty_tier
                        .is_none_or(|t| item.difficulty_tier == t)
                })
                .filter(|item| !query.exclude_ids.contains(&item.id))
                .cloned()
                .collect())
        })
    }

    fn apply_calibration<'a>(
        &'a self,
        updates: &'a [Item],
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut items = self.items.write().unwrap();
            for update in updates {
                items.insert(update.id, update.clone());
            }
            Ok(())
        })
    }

    fn list_all<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, StoreError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.items.read().unwrap().values().cloned().collect()) })
    }

    fn set_anchor<'a>(
        &'a self,
        id: i64,
        anchor: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Item, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut items = self.items.write().unwrap();
            let item = items.get_mut(&id).ok_or(StoreError::ItemNotFound(id))?;
            item.anchor = anchor;
            item.anchor_designated_at = anchor.then_some(now);
            Ok(item.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiq_core::item::QualityState;
    use aiq_core::item::IrtParams;
    use chrono::Utc;

    fn sample_item(id: i64, domain: Domain, tier: DifficultyTier, calibrated: bool) -> Item {
        Item {
            id,
            prompt: "prompt".into(),
            stimulus: None,
            options: vec!["a".into(), "b".into()],
            correct_option: 0,
            domain,
            difficulty_tier: tier,
            empirical_p: 0.5,
            point_biserial: 0.3,
            irt: calibrated.then(|| IrtParams::new(0.0, 1.0, 0.1, 0.1, Utc::now(), 100)),
            active: true,
            quality: QualityState::Normal,
            anchor: false,
            anchor_designated_at: None,
        }
    }

    #[tokio::test]
    async fn query_excludes_uncalibrated_items() {
        let bank = InMemoryItemBank::new(vec![sample_item(1, Domain::Math, DifficultyTier::Easy, false)]);
        let results = bank.query_eligible(&ItemQuery::default()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn query_filters_by_domain_and_excludes_served() {
        let bank = InMemoryItemBank::new(vec![
            sample_item(1, Domain::Math, DifficultyTier::Easy, true),
            sample_item(2, Domain::Logic, DifficultyTier::Easy, true),
        ]);
        let query = ItemQuery {
            domain: Some(Domain::Math),
            ..Default::default()
        };
        let results = bank.query_eligible(&query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);

        let mut exclude = HashSet::new();
        exclude.insert(1);
        let query = ItemQuery {
            exclude_ids: exclude,
            ..Default::default()
        };
        let results = bank.query_eligible(&query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 2);
    }

    #[tokio::test]
    async fn apply_calibration_replaces_params_atomically() {
        let bank = InMemoryItemBank::new(vec![sample_item(1, Domain::Math, DifficultyTier::Easy, false)]);
        let mut updated = sample_item(1, Domain::Math, DifficultyTier::Easy, true);
        updated.empirical_p = 0.9;
        bank.apply_calibration(&[updated]).await.unwrap();
        let item = bank.get(1).await.unwrap();
        assert!(item.irt.is_some());
        assert_eq!(item.empirical_p, 0.9);
    }

    #[tokio::test]
    async fn get_unknown_item_is_an_error() {
        let bank = InMemoryItemBank::new(vec![]);
        assert!(bank.get(99).await.is_err());
    }
}
