use core::sync::atomic::{AtomicU64, Ordering};
use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};

use crate::{
    Error, Item, ItemDetails, ItemNumber, ItemStore, Prefix, Result, SequenceCounter,
    SequenceStore,
};

/// An in-process store backed by one atomic counter per prefix.
///
/// Counters for different prefixes never contend: the map lock is only taken
/// exclusively the first time a prefix is seen. Nothing survives a restart,
/// so this backend is meant for tests, demos and single-process tooling.
///
/// Cloning is cheap and shares state.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    counters: Arc<RwLock<HashMap<Prefix, Arc<AtomicU64>>>>,
    items: Arc<Mutex<HashMap<String, Item>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, prefix: &Prefix) -> Arc<AtomicU64> {
        if let Some(counter) = self.counters.read().get(prefix) {
            return Arc::clone(counter);
        }
        Arc::clone(self.counters.write().entry(prefix.clone()).or_default())
    }

    fn update_item<T>(&self, id: &str, f: impl FnOnce(&mut Item) -> T) -> Result<Item> {
        let mut items = self.items.lock();
        let item = items.get_mut(id).ok_or_else(|| Error::ItemNotFound {
            id: id.to_string(),
        })?;
        f(item);
        Ok(item.clone())
    }
}

impl SequenceStore for MemoryBackend {
    async fn allocate(&self, prefix: &Prefix) -> Result<u64> {
        let previous = self
            .counter(prefix)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_add(1))
            .map_err(|_| Error::invariant(prefix.to_string(), "counter exhausted"))?;
        Ok(previous + 1)
    }

    async fn current(&self, prefix: &Prefix) -> Result<Option<u64>> {
        Ok(self
            .counters
            .read()
            .get(prefix)
            .map(|counter| counter.load(Ordering::Acquire)))
    }

    async fn advance_to(&self, prefix: &Prefix, floor: u64) -> Result<u64> {
        let previous = self.counter(prefix).fetch_max(floor, Ordering::AcqRel);
        Ok(previous.max(floor))
    }

    async fn counters(&self) -> Result<Vec<SequenceCounter>> {
        let mut counters: Vec<_> = self
            .counters
            .read()
            .iter()
            .map(|(prefix, counter)| SequenceCounter {
                prefix: prefix.clone(),
                last_value: counter.load(Ordering::Acquire),
            })
            .collect();
        counters.sort_unstable_by(|a, b| a.prefix.cmp(&b.prefix));
        Ok(counters)
    }
}

impl ItemStore for MemoryBackend {
    async fn get(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.items.lock().get(id).cloned())
    }

    async fn save_details(&self, id: &str, details: &ItemDetails) -> Result<Item> {
        let mut items = self.items.lock();
        let item = items
            .entry(id.to_string())
            .and_modify(|item| item.details = details.clone())
            .or_insert_with(|| Item::new(id, details.clone()));
        Ok(item.clone())
    }

    async fn lock_item_number(&self, id: &str, number: &ItemNumber) -> Result<Item> {
        self.update_item(id, |item| item.lock_item_number(number))
    }

    async fn replace_item_number(&self, id: &str, number: &ItemNumber) -> Result<Item> {
        self.update_item(id, |item| item.replace_item_number(number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::tests::*;

    #[tokio::test]
    async fn first_allocation_starts_at_one() {
        run_first_allocation_starts_at_one(&MemoryBackend::new()).await;
    }

    #[tokio::test]
    async fn allocations_are_strictly_increasing() {
        run_allocations_are_strictly_increasing(&MemoryBackend::new()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_allocations_are_unique_and_gapless() {
        run_concurrent_allocations_are_unique_and_gapless(MemoryBackend::new()).await;
    }

    #[tokio::test]
    async fn prefixes_are_independent() {
        run_prefixes_are_independent(&MemoryBackend::new()).await;
    }

    #[tokio::test]
    async fn advance_to_never_lowers() {
        run_advance_to_never_lowers(&MemoryBackend::new()).await;
    }

    #[tokio::test]
    async fn counters_are_listed_in_prefix_order() {
        run_counters_are_listed_in_prefix_order(&MemoryBackend::new()).await;
    }

    #[tokio::test]
    async fn exhausted_counter_is_an_invariant_violation() {
        let store = MemoryBackend::new();
        let prefix = Prefix::new("LV", "SPD");
        store.advance_to(&prefix, u64::MAX).await.unwrap();

        let err = store.allocate(&prefix).await.unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }), "{err}");
        assert_eq!(store.current(&prefix).await.unwrap(), Some(u64::MAX));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryBackend::new();
        let clone = store.clone();
        let prefix = Prefix::new("CH", "FLP");

        store.allocate(&prefix).await.unwrap();
        assert_eq!(clone.allocate(&prefix).await.unwrap(), 2);
    }
}
