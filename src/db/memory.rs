use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::db::store::PriceStore;
use crate::error::StorageError;
use crate::types::{NormalizedPrice, PriceRecord};

/// Process-local history used for dry runs. Each item's records sit behind their
/// own map shard, so concurrent items never contend on a global lock.
#[derive(Default)]
pub struct MemoryStore {
    history: DashMap<String, Vec<PriceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn record_count(&self, item_name: &str) -> usize {
        self.history.get(item_name).map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn get_last_price(&self, item_name: &str) -> Result<Option<PriceRecord>, StorageError> {
        Ok(self.history.get(item_name).and_then(|records| records.last().cloned()))
    }

    async fn append_record(
        &self,
        item_name: &str,
        _url: &str,
        price: &NormalizedPrice,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.history.entry(item_name.to_string()).or_default().push(PriceRecord {
            item_name: item_name.to_string(),
            value: price.value,
            currency_hint: price.currency_hint.clone(),
            recorded_at,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn keeps_history_per_item() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.append_record("a", "u", &NormalizedPrice::new(Decimal::from(3)), now).await.unwrap();
        store.append_record("a", "u", &NormalizedPrice::new(Decimal::from(2)), now).await.unwrap();
        store.append_record("b", "u", &NormalizedPrice::new(Decimal::from(9)), now).await.unwrap();

        assert_eq!(store.record_count("a"), 2);
        let last = store.get_last_price("a").await.unwrap().unwrap();
        assert_eq!(last.value, Decimal::from(2));
        assert!(store.get_last_price("c").await.unwrap().is_none());
    }
}
