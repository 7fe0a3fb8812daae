use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Item, ItemDetails, ItemNumber, ItemStore, Prefix, Result, SequenceCounter,
    SequenceStore,
};

/// Counter values are stored as decimal text so a damaged value is detected
/// on read instead of being reinterpreted as some other number.
const COUNTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("emz_sequence_counters");
/// Items are stored as JSON.
const ITEMS: TableDefinition<&str, &[u8]> = TableDefinition::new("emz_items");

/// A single-file embedded store.
///
/// redb serializes write transactions, so every read-increment-write of a
/// counter is atomic with respect to all other writers of the database. Calls
/// run on the blocking thread pool.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Opens (or creates) the database at `path` and ensures both tables
    /// exist.
    ///
    /// # Errors
    ///
    /// [`Error::StorageUnavailable`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(Error::storage)?;
        let txn = db.begin_write().map_err(Error::storage)?;
        txn.open_table(COUNTERS).map_err(Error::storage)?;
        txn.open_table(ITEMS).map_err(Error::storage)?;
        txn.commit().map_err(Error::storage)?;
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| Error::storage(format_args!("redb task failed: {e}")))?
    }

    /// Applies `next` to the current counter value and commits the result.
    async fn update_counter<F>(&self, prefix: &Prefix, next: F) -> Result<u64>
    where
        F: FnOnce(&str, Option<u64>) -> Result<u64> + Send + 'static,
    {
        let key = prefix.to_string();
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(Error::storage)?;
            let value = {
                let mut table = txn.open_table(COUNTERS).map_err(Error::storage)?;
                let current = match table.get(key.as_str()).map_err(Error::storage)? {
                    Some(raw) => Some(decode_counter(&key, raw.value())?),
                    None => None,
                };
                let value = next(&key, current)?;
                table
                    .insert(key.as_str(), value.to_string().as_bytes())
                    .map_err(Error::storage)?;
                value
            };
            txn.commit().map_err(Error::storage)?;
            Ok(value)
        })
        .await
    }

    /// Applies `update` to a stored item and commits it.
    async fn update_item<F>(&self, id: &str, update: F) -> Result<Item>
    where
        F: FnOnce(&mut Item) + Send + 'static,
    {
        let id = id.to_string();
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(Error::storage)?;
            let mut item = read_item(&txn, &id)?.ok_or_else(|| Error::ItemNotFound {
                id: id.clone(),
            })?;
            update(&mut item);
            write_item(&txn, &item)?;
            txn.commit().map_err(Error::storage)?;
            Ok(item)
        })
        .await
    }
}

fn decode_counter(key: &str, raw: &[u8]) -> Result<u64> {
    let text = core::str::from_utf8(raw)
        .map_err(|_| Error::invariant(key, "last_value is not text"))?;
    let value: i128 = text
        .parse()
        .map_err(|_| Error::invariant(key, format!("last_value `{text}` is not an integer")))?;
    u64::try_from(value)
        .map_err(|_| Error::invariant(key, format!("last_value {value} is out of range")))
}

fn decode_item(id: &str, raw: &[u8]) -> Result<Item> {
    serde_json::from_slice(raw)
        .map_err(|e| Error::invariant(id, format!("stored item is malformed: {e}")))
}

fn read_item(txn: &WriteTransaction, id: &str) -> Result<Option<Item>> {
    let table = txn.open_table(ITEMS).map_err(Error::storage)?;
    let raw = table.get(id).map_err(Error::storage)?;
    raw.map(|raw| decode_item(id, raw.value())).transpose()
}

fn write_item(txn: &WriteTransaction, item: &Item) -> Result<()> {
    let json = serde_json::to_vec(item).map_err(Error::storage)?;
    let mut table = txn.open_table(ITEMS).map_err(Error::storage)?;
    table
        .insert(item.id.as_str(), json.as_slice())
        .map_err(Error::storage)?;
    Ok(())
}

impl SequenceStore for RedbBackend {
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self), err))]
    async fn allocate(&self, prefix: &Prefix) -> Result<u64> {
        self.update_counter(prefix, |key, current| match current {
            None => Ok(1),
            Some(value) => value
                .checked_add(1)
                .ok_or_else(|| Error::invariant(key, "counter exhausted")),
        })
        .await
    }

    async fn current(&self, prefix: &Prefix) -> Result<Option<u64>> {
        let key = prefix.to_string();
        self.blocking(move |db| {
            let txn = db.begin_read().map_err(Error::storage)?;
            let table = txn.open_table(COUNTERS).map_err(Error::storage)?;
            let raw = table.get(key.as_str()).map_err(Error::storage)?;
            raw.map(|raw| decode_counter(&key, raw.value())).transpose()
        })
        .await
    }

    async fn advance_to(&self, prefix: &Prefix, floor: u64) -> Result<u64> {
        self.update_counter(prefix, move |_, current| {
            Ok(current.map_or(floor, |value| value.max(floor)))
        })
        .await
    }

    async fn counters(&self) -> Result<Vec<SequenceCounter>> {
        self.blocking(|db| {
            let txn = db.begin_read().map_err(Error::storage)?;
            let table = txn.open_table(COUNTERS).map_err(Error::storage)?;
            let mut counters = Vec::new();
            for entry in table.iter().map_err(Error::storage)? {
                let (key, raw) = entry.map_err(Error::storage)?;
                let key = key.value();
                let prefix = key
                    .parse::<Prefix>()
                    .map_err(|_| Error::invariant(key, "stored prefix is malformed"))?;
                counters.push(SequenceCounter {
                    prefix,
                    last_value: decode_counter(key, raw.value())?,
                });
            }
            counters.sort_unstable_by(|a, b| a.prefix.cmp(&b.prefix));
            Ok(counters)
        })
        .await
    }
}

impl ItemStore for RedbBackend {
    async fn get(&self, id: &str) -> Result<Option<Item>> {
        let id = id.to_string();
        self.blocking(move |db| {
            let txn = db.begin_read().map_err(Error::storage)?;
            let table = txn.open_table(ITEMS).map_err(Error::storage)?;
            let raw = table.get(id.as_str()).map_err(Error::storage)?;
            raw.map(|raw| decode_item(&id, raw.value())).transpose()
        })
        .await
    }

    async fn save_details(&self, id: &str, details: &ItemDetails) -> Result<Item> {
        let id = id.to_string();
        let details = details.clone();
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(Error::storage)?;
            let item = match read_item(&txn, &id)? {
                Some(mut item) => {
                    item.details = details;
                    item
                }
                None => Item::new(id, details),
            };
            write_item(&txn, &item)?;
            txn.commit().map_err(Error::storage)?;
            Ok(item)
        })
        .await
    }

    async fn lock_item_number(&self, id: &str, number: &ItemNumber) -> Result<Item> {
        let number = number.clone();
        self.update_item(id, move |item| {
            item.lock_item_number(&number);
        })
        .await
    }

    async fn replace_item_number(&self, id: &str, number: &ItemNumber) -> Result<Item> {
        let number = number.clone();
        self.update_item(id, move |item| item.replace_item_number(&number))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::tests::*;

    fn open() -> (tempfile::TempDir, RedbBackend) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbBackend::open(dir.path().join("emz.redb")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn first_allocation_starts_at_one() {
        let (_dir, store) = open();
        run_first_allocation_starts_at_one(&store).await;
    }

    #[tokio::test]
    async fn allocations_are_strictly_increasing() {
        let (_dir, store) = open();
        run_allocations_are_strictly_increasing(&store).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_allocations_are_unique_and_gapless() {
        let (_dir, store) = open();
        run_concurrent_allocations_are_unique_and_gapless(store).await;
    }

    #[tokio::test]
    async fn prefixes_are_independent() {
        let (_dir, store) = open();
        run_prefixes_are_independent(&store).await;
    }

    #[tokio::test]
    async fn advance_to_never_lowers() {
        let (_dir, store) = open();
        run_advance_to_never_lowers(&store).await;
    }

    #[tokio::test]
    async fn counters_are_listed_in_prefix_order() {
        let (_dir, store) = open();
        run_counters_are_listed_in_prefix_order(&store).await;
    }

    #[tokio::test]
    async fn counters_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emz.redb");
        let prefix = Prefix::new("LV", "SPD");
        {
            let store = RedbBackend::open(&path).unwrap();
            store.allocate(&prefix).await.unwrap();
            store.allocate(&prefix).await.unwrap();
        }

        let store = RedbBackend::open(&path).unwrap();
        assert_eq!(store.allocate(&prefix).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn corrupt_counter_is_reported_and_left_untouched() {
        let (_dir, store) = open();
        let prefix = Prefix::new("LV", "SPD");
        for corrupt in [&b"-4"[..], &b"twelve"[..], &b"\xff\xfe"[..]] {
            let txn = store.db.begin_write().unwrap();
            txn.open_table(COUNTERS)
                .unwrap()
                .insert("LV-SPD", corrupt)
                .unwrap();
            txn.commit().unwrap();

            let err = store.allocate(&prefix).await.unwrap_err();
            assert!(matches!(err, Error::InvariantViolation { .. }), "{err}");
            assert!(!err.is_transient());

            let txn = store.db.begin_read().unwrap();
            let table = txn.open_table(COUNTERS).unwrap();
            assert_eq!(table.get("LV-SPD").unwrap().unwrap().value(), corrupt);
        }
    }

    #[tokio::test]
    async fn intake_locks_item_numbers() {
        let (_dir, store) = open();
        crate::intake::tests::run_resave_keeps_locked_item_number(store.clone(), store).await;
    }

    #[tokio::test]
    async fn intake_reassign_replaces_item_number() {
        let (_dir, store) = open();
        crate::intake::tests::run_reassign_replaces_item_number(store.clone(), store).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn intake_concurrent_first_saves_lock_once() {
        let (_dir, store) = open();
        crate::intake::tests::run_concurrent_first_saves_lock_once(store.clone(), store).await;
    }
}
