use core::future::pending;

use crate::{Prefix, Result, SequenceCounter, SequenceStore};

/// A store whose calls never complete.
pub(crate) struct StalledStore;

impl SequenceStore for StalledStore {
    async fn allocate(&self, _prefix: &Prefix) -> Result<u64> {
        pending().await
    }

    async fn current(&self, _prefix: &Prefix) -> Result<Option<u64>> {
        pending().await
    }

    async fn advance_to(&self, _prefix: &Prefix, _floor: u64) -> Result<u64> {
        pending().await
    }

    async fn counters(&self) -> Result<Vec<SequenceCounter>> {
        pending().await
    }
}

pub(crate) async fn run_first_allocation_starts_at_one<S: SequenceStore>(store: &S) {
    let prefix = Prefix::new("LV", "SPD");
    assert_eq!(store.current(&prefix).await.unwrap(), None);
    assert_eq!(store.allocate(&prefix).await.unwrap(), 1);
    assert_eq!(store.current(&prefix).await.unwrap(), Some(1));
}

pub(crate) async fn run_allocations_are_strictly_increasing<S: SequenceStore>(store: &S) {
    let prefix = Prefix::new("CH", "FLP");
    let mut previous = 0;
    for _ in 0..25 {
        let value = store.allocate(&prefix).await.unwrap();
        assert_eq!(value, previous + 1);
        previous = value;
    }
    assert_eq!(store.current(&prefix).await.unwrap(), Some(25));
}

pub(crate) async fn run_prefixes_are_independent<S: SequenceStore>(store: &S) {
    let marmont = Prefix::new("GC", "MRM");
    let birkin = Prefix::new("HR", "BRK");

    assert_eq!(store.allocate(&marmont).await.unwrap(), 1);
    assert_eq!(store.allocate(&marmont).await.unwrap(), 2);
    assert_eq!(store.allocate(&birkin).await.unwrap(), 1);
    assert_eq!(store.allocate(&marmont).await.unwrap(), 3);
    assert_eq!(store.allocate(&birkin).await.unwrap(), 2);
}

pub(crate) async fn run_advance_to_never_lowers<S: SequenceStore>(store: &S) {
    let prefix = Prefix::new("DR", "LDY");

    assert_eq!(store.advance_to(&prefix, 40).await.unwrap(), 40);
    assert_eq!(store.allocate(&prefix).await.unwrap(), 41);
    assert_eq!(store.advance_to(&prefix, 10).await.unwrap(), 41);
    assert_eq!(store.allocate(&prefix).await.unwrap(), 42);
    assert_eq!(store.current(&prefix).await.unwrap(), Some(42));
    assert_eq!(store.current(&Prefix::new("DR", "SDL")).await.unwrap(), None);
}

pub(crate) async fn run_concurrent_allocations_are_unique_and_gapless<S>(store: S)
where
    S: SequenceStore + Clone + 'static,
{
    const TASKS: u64 = 100;
    let prefix = Prefix::new("BR-GEN", "GEN");

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let store = store.clone();
            let prefix = prefix.clone();
            tokio::spawn(async move { store.allocate(&prefix).await })
        })
        .collect();

    let mut values: Vec<u64> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    values.sort_unstable();

    assert_eq!(values, (1..=TASKS).collect::<Vec<_>>());
    assert_eq!(store.current(&prefix).await.unwrap(), Some(TASKS));
}

/// Expects a store with no counters.
pub(crate) async fn run_counters_are_listed_in_prefix_order<S: SequenceStore>(store: &S) {
    assert!(store.counters().await.unwrap().is_empty());

    let speedy = Prefix::new("LV", "SPD");
    let generic = Prefix::new("BR-GEN", "GEN");
    let flap = Prefix::new("CH", "FLP");
    store.allocate(&speedy).await.unwrap();
    store.allocate(&speedy).await.unwrap();
    store.allocate(&generic).await.unwrap();
    store.advance_to(&flap, 7).await.unwrap();

    let counters = store.counters().await.unwrap();
    assert_eq!(
        counters,
        vec![
            SequenceCounter {
                prefix: generic,
                last_value: 1
            },
            SequenceCounter {
                prefix: flap,
                last_value: 7
            },
            SequenceCounter {
                prefix: speedy,
                last_value: 2
            },
        ]
    );
}
