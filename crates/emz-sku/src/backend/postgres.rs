use core::time::Duration;

use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Item, ItemDetails, ItemNumber, ItemStore, Prefix, Result, SequenceCounter,
    SequenceStore, schema,
};

/// A store backed by the `emz_sequence_counters` and `emz_items` tables.
///
/// Each allocation is one `INSERT .. ON CONFLICT DO UPDATE .. RETURNING`
/// statement, so the increment happens inside Postgres under the row lock
/// and any number of service replicas can share the database. The returned
/// value is checked before the transaction commits; a corrupt counter is
/// rolled back untouched.
#[derive(Clone, Debug)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Connects a pool to `url`.
    ///
    /// # Errors
    ///
    /// [`Error::StorageUnavailable`] if no connection can be established.
    pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(Error::storage)?;
        Ok(Self::from_pool(pool))
    }

    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// [`Error::StorageUnavailable`] if a statement fails.
    pub async fn migrate(&self) -> Result<()> {
        for statement in schema::MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(Error::storage)?;
        }
        Ok(())
    }

    /// Runs a counter upsert and commits only if the result is valid.
    async fn upsert_counter(&self, sql: &'static str, key: &str, floor: Option<i64>) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        let mut query = sqlx::query_scalar::<_, i64>(sql).bind(key);
        if let Some(floor) = floor {
            query = query.bind(floor);
        }
        let value = query
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx(key, e))?;
        // Dropping `tx` on error rolls back.
        let value = check_counter(key, value)?;
        if floor.is_none() && value == 0 {
            return Err(Error::invariant(key, "counter is 0 after increment"));
        }
        tx.commit().await.map_err(Error::storage)?;
        Ok(value)
    }
}

/// Decode failures mean the stored data is not what the schema promises;
/// everything else is treated as the database being unavailable.
fn map_sqlx(key: &str, err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. } => Error::invariant(key, err.to_string()),
        other => Error::storage(other),
    }
}

fn check_counter(key: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::invariant(key, format!("last_value {value} is negative")))
}

fn item_from_row(row: &PgRow) -> Result<Item> {
    let id: String = row.try_get("id").map_err(|e| map_sqlx("emz_items", e))?;
    let get = |column: &str| row.try_get::<Option<String>, _>(column).map_err(|e| map_sqlx(&id, e));

    let details = ItemDetails {
        brand: get("brand")?.unwrap_or_default(),
        model: get("model")?.unwrap_or_default(),
        title: get("title")?,
    };
    let item_number = get("item_number")?
        .map(|raw| {
            raw.parse::<ItemNumber>()
                .map_err(|_| Error::invariant(&id, format!("stored item number `{raw}` is malformed")))
        })
        .transpose()?;
    let item_number_locked: bool = row
        .try_get("item_number_locked")
        .map_err(|e| map_sqlx(&id, e))?;
    if item_number_locked && item_number.is_none() {
        return Err(Error::invariant(&id, "item is locked without an item number"));
    }

    Ok(Item {
        id,
        details,
        item_number,
        item_number_locked,
    })
}

impl SequenceStore for PgBackend {
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self), err))]
    async fn allocate(&self, prefix: &Prefix) -> Result<u64> {
        self.upsert_counter(schema::ALLOCATE_SEQUENCE, &prefix.to_string(), None)
            .await
    }

    async fn current(&self, prefix: &Prefix) -> Result<Option<u64>> {
        let key = prefix.to_string();
        let value = sqlx::query_scalar::<_, i64>(schema::SELECT_SEQUENCE)
            .bind(&key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(&key, e))?;
        value.map(|value| check_counter(&key, value)).transpose()
    }

    async fn advance_to(&self, prefix: &Prefix, floor: u64) -> Result<u64> {
        let floor = i64::try_from(floor)
            .map_err(|_| Error::validation(format!("floor {floor} exceeds the counter range")))?;
        self.upsert_counter(schema::ADVANCE_SEQUENCE, &prefix.to_string(), Some(floor))
            .await
    }

    async fn counters(&self) -> Result<Vec<SequenceCounter>> {
        let rows = sqlx::query(schema::LIST_SEQUENCES)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::storage)?;
        let mut counters = rows
            .iter()
            .map(|row| {
                let key: String = row
                    .try_get("prefix")
                    .map_err(|e| map_sqlx("emz_sequence_counters", e))?;
                let value: i64 = row.try_get("last_value").map_err(|e| map_sqlx(&key, e))?;
                let prefix = key
                    .parse::<Prefix>()
                    .map_err(|_| Error::invariant(&key, "stored prefix is malformed"))?;
                Ok(SequenceCounter {
                    prefix,
                    last_value: check_counter(&key, value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        // Collation-dependent `ORDER BY` may not match `Prefix` ordering.
        counters.sort_unstable_by(|a, b| a.prefix.cmp(&b.prefix));
        Ok(counters)
    }
}

impl ItemStore for PgBackend {
    async fn get(&self, id: &str) -> Result<Option<Item>> {
        let row = sqlx::query(schema::SELECT_ITEM)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(id, e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn save_details(&self, id: &str, details: &ItemDetails) -> Result<Item> {
        let row = sqlx::query(schema::SAVE_ITEM_DETAILS)
            .bind(id)
            .bind(&details.brand)
            .bind(&details.model)
            .bind(details.title.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx(id, e))?;
        item_from_row(&row)
    }

    async fn lock_item_number(&self, id: &str, number: &ItemNumber) -> Result<Item> {
        sqlx::query(schema::LOCK_ITEM_NUMBER)
            .bind(id)
            .bind(number.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx(id, e))?;
        self.get(id).await?.ok_or_else(|| Error::ItemNotFound {
            id: id.to_string(),
        })
    }

    async fn replace_item_number(&self, id: &str, number: &ItemNumber) -> Result<Item> {
        let row = sqlx::query(schema::REPLACE_ITEM_NUMBER)
            .bind(id)
            .bind(number.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(id, e))?;
        match row {
            Some(row) => item_from_row(&row),
            None => Err(Error::ItemNotFound { id: id.to_string() }),
        }
    }
}

/// Runs against a live database and is skipped unless
/// `EMZ_TEST_DATABASE_URL` is set. The harnesses share one database and are
/// run in sequence, with the tables wiped where a harness needs them empty.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{intake::tests as intake, sequence::tests::*};

    async fn truncate(store: &PgBackend) {
        sqlx::query("TRUNCATE emz_sequence_counters, emz_items")
            .execute(store.pool())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn postgres_backend_contract() {
        let Ok(url) = std::env::var("EMZ_TEST_DATABASE_URL") else {
            return;
        };
        let store = PgBackend::connect(&url, 16, Duration::from_secs(5)).await.unwrap();
        store.migrate().await.unwrap();

        truncate(&store).await;
        run_counters_are_listed_in_prefix_order(&store).await;

        truncate(&store).await;
        run_first_allocation_starts_at_one(&store).await;
        run_allocations_are_strictly_increasing(&store).await;
        run_prefixes_are_independent(&store).await;
        run_advance_to_never_lowers(&store).await;
        run_concurrent_allocations_are_unique_and_gapless(store.clone()).await;

        intake::run_resave_keeps_locked_item_number(store.clone(), store.clone()).await;
        intake::run_reassign_replaces_item_number(store.clone(), store.clone()).await;
        intake::run_concurrent_first_saves_lock_once(store.clone(), store.clone()).await;

        sqlx::query("INSERT INTO emz_sequence_counters (prefix, last_value) VALUES ('PG-BAD', -5)")
            .execute(store.pool())
            .await
            .unwrap();
        let bad = Prefix::new("PG", "BAD");
        let err = store.allocate(&bad).await.unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }), "{err}");
        let value: i64 =
            sqlx::query_scalar("SELECT last_value FROM emz_sequence_counters WHERE prefix = 'PG-BAD'")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(value, -5);

        let err = store.current(&bad).await.unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }), "{err}");
        let err = store.counters().await.unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }), "{err}");
    }
}
