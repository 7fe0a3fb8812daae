//! SQL shared by the Postgres backend and the `pg-emz-sku` extension.
//!
//! Counters are only ever mutated by [`ALLOCATE_SEQUENCE`] and
//! [`ADVANCE_SEQUENCE`], each a single upsert, so the read-increment-write
//! happens inside Postgres under the row lock of the conflicting key.

/// Also loaded verbatim by the `pg-emz-sku` extension.
pub const CREATE_SEQUENCE_COUNTERS: &str = include_str!("../sql/create_sequence_counters.sql");

pub const CREATE_ITEMS: &str = "\
CREATE TABLE IF NOT EXISTS emz_items (
    id                 TEXT PRIMARY KEY,
    brand              TEXT NOT NULL,
    model              TEXT NOT NULL,
    title              TEXT,
    item_number        TEXT UNIQUE,
    item_number_locked BOOLEAN NOT NULL DEFAULT FALSE
)";

/// Statements run, in order, by `PgBackend::migrate`.
pub const MIGRATIONS: &[&str] = &[CREATE_SEQUENCE_COUNTERS, CREATE_ITEMS];

/// `$1` = prefix. Returns the allocated value.
pub const ALLOCATE_SEQUENCE: &str = "\
INSERT INTO emz_sequence_counters AS c (prefix, last_value)
VALUES ($1, 1)
ON CONFLICT (prefix) DO UPDATE SET last_value = c.last_value + 1
RETURNING c.last_value";

/// `$1` = prefix, `$2` = floor. Returns the resulting value.
pub const ADVANCE_SEQUENCE: &str = "\
INSERT INTO emz_sequence_counters AS c (prefix, last_value)
VALUES ($1, $2)
ON CONFLICT (prefix) DO UPDATE SET last_value = GREATEST(c.last_value, EXCLUDED.last_value)
RETURNING c.last_value";

pub const SELECT_SEQUENCE: &str =
    "SELECT last_value FROM emz_sequence_counters WHERE prefix = $1";

pub const LIST_SEQUENCES: &str =
    "SELECT prefix, last_value FROM emz_sequence_counters ORDER BY prefix";

pub const SELECT_ITEM: &str = "\
SELECT id, brand, model, title, item_number, item_number_locked
FROM emz_items WHERE id = $1";

/// `$1..$4` = id, brand, model, title.
pub const SAVE_ITEM_DETAILS: &str = "\
INSERT INTO emz_items (id, brand, model, title)
VALUES ($1, $2, $3, $4)
ON CONFLICT (id) DO UPDATE
SET brand = EXCLUDED.brand, model = EXCLUDED.model, title = EXCLUDED.title
RETURNING id, brand, model, title, item_number, item_number_locked";

/// `$1` = id, `$2` = item number. Affects no row once the item is locked.
pub const LOCK_ITEM_NUMBER: &str = "\
UPDATE emz_items SET item_number = $2, item_number_locked = TRUE
WHERE id = $1 AND NOT item_number_locked";

/// `$1` = id, `$2` = item number.
pub const REPLACE_ITEM_NUMBER: &str = "\
UPDATE emz_items SET item_number = $2, item_number_locked = TRUE
WHERE id = $1
RETURNING id, brand, model, title, item_number, item_number_locked";
