use emz_sku::{Prefix, derive_prefix, format_item_number, schema};
use pgrx::prelude::*;

pgrx::pg_module_magic!();

// ============================================================================
// CODE DERIVATION
// ============================================================================

/// Brand code for free-text brand, e.g. `'Louis Vuitton'` -> `LV`.
#[pg_extern(immutable, parallel_safe, strict)]
fn emz_brand_code(brand: &str) -> String {
    emz_sku::brand_code(brand)
}

/// Three-character model code for free-text model, e.g. `'Speedy 30'` ->
/// `SPD`.
#[pg_extern(immutable, parallel_safe, strict)]
fn emz_model_code(model: &str) -> String {
    emz_sku::model_code(model)
}

/// Counter key `{brand_code}-{model_code}`.
#[pg_extern(immutable, parallel_safe, strict)]
fn emz_sku_prefix(brand: &str, model: &str) -> String {
    derive_prefix(brand, model).to_string()
}

/// `{brand_code}-{model_code}-EMZ-{sequence}` with the sequence padded to at
/// least three digits.
#[pg_extern(immutable, parallel_safe, strict)]
fn emz_format_item_number(brand_code: &str, model_code: &str, sequence: i64) -> String {
    let Ok(sequence) = u64::try_from(sequence) else {
        pgrx::error!("sequence must not be negative, got {sequence}");
    };
    if sequence == 0 {
        pgrx::error!("sequence starts at 1");
    }
    format_item_number(brand_code, model_code, sequence)
}

// ============================================================================
// ALLOCATION
// ============================================================================

/// Atomically allocates the next value for `prefix` in
/// `emz_sequence_counters`. The first call for a prefix returns 1.
///
/// A corrupt counter raises an error, which aborts the transaction and
/// leaves the stored value untouched.
#[pg_extern(volatile, parallel_unsafe, strict, requires = ["counters_table"])]
fn emz_allocate_sequence(prefix: &str) -> i64 {
    if let Err(err) = prefix.parse::<Prefix>() {
        pgrx::error!("{err}");
    }
    allocate(prefix)
}

/// Derives the prefix, allocates a sequence value and formats the item
/// number in one call.
#[pg_extern(volatile, parallel_unsafe, strict, requires = ["counters_table"])]
fn emz_next_item_number(brand: &str, model: &str) -> String {
    if brand.trim().is_empty() || model.trim().is_empty() {
        pgrx::error!("brand and model must not be empty");
    }
    let prefix = derive_prefix(brand, model);
    let sequence = allocate(&prefix.to_string());
    // `allocate` never returns a value below 1.
    format_item_number(prefix.brand_code(), prefix.model_code(), sequence.unsigned_abs())
}

fn allocate(prefix: &str) -> i64 {
    let value = Spi::connect_mut(|client| {
        client
            .update(schema::ALLOCATE_SEQUENCE, Some(1), &[prefix.into()])?
            .first()
            .get_one::<i64>()
    });
    match value {
        Ok(Some(value)) if value >= 1 => value,
        Ok(Some(value)) => {
            pgrx::error!("invariant violated for `{prefix}`: last_value {value} after increment")
        }
        Ok(None) => pgrx::error!("allocation for `{prefix}` returned no row"),
        Err(err) => pgrx::error!("allocation for `{prefix}` failed: {err}"),
    }
}

// ============================================================================
// SQL
// ============================================================================
// Same file as `emz_sku::schema::CREATE_SEQUENCE_COUNTERS`.
extension_sql_file!(
    "../../emz-sku/sql/create_sequence_counters.sql",
    name = "counters_table",
);
extension_sql!(
    r#"
COMMENT ON TABLE emz_sequence_counters IS 'Last allocated sequence value per brand/model prefix';
COMMENT ON FUNCTION emz_allocate_sequence(text) IS 'Atomically allocate the next sequence value for a prefix';
COMMENT ON FUNCTION emz_next_item_number(text, text) IS 'Derive codes and allocate a formatted EMZ item number';
"#,
    name = "add_comments",
    requires = ["counters_table", emz_allocate_sequence, emz_next_item_number]
);

// ============================================================================
// TESTS
// ============================================================================

#[cfg(any(test, feature = "pg_test"))]
#[pg_schema]
mod tests {
    use super::*;

    #[pg_test]
    fn derives_codes() {
        assert_eq!(emz_brand_code("Louis Vuitton"), "LV");
        assert_eq!(emz_brand_code(""), "BR-GEN");
        assert_eq!(emz_model_code("Neverfull MM"), "NVF");
        assert_eq!(emz_model_code("Id"), "IDX");
        assert_eq!(emz_sku_prefix("Chanel", "Classic Flap"), "CH-FLP");
    }

    #[pg_test]
    fn derives_codes_from_sql() {
        let prefix = Spi::get_one::<String>("SELECT emz_sku_prefix('Gucci', 'Marmont')")
            .unwrap()
            .unwrap();
        assert_eq!(prefix, "GC-MRM");
    }

    #[pg_test]
    fn formats_item_numbers() {
        assert_eq!(emz_format_item_number("LV", "SPD", 7), "LV-SPD-EMZ-007");
        assert_eq!(
            emz_format_item_number("BR-GEN", "GEN", 1250),
            "BR-GEN-GEN-EMZ-1250"
        );
    }

    #[pg_test(error = "sequence starts at 1")]
    fn rejects_zero_sequence() {
        emz_format_item_number("LV", "SPD", 0);
    }

    #[pg_test]
    fn counters_table_matches_the_shared_schema() {
        assert!(schema::CREATE_SEQUENCE_COUNTERS.contains("emz_sequence_counters"));
        let columns = Spi::get_one::<i64>(
            "SELECT count(*) FROM information_schema.columns \
             WHERE table_name = 'emz_sequence_counters' \
             AND column_name IN ('prefix', 'last_value')",
        )
        .unwrap()
        .unwrap();
        assert_eq!(columns, 2);
        // Re-running the shared DDL is a no-op.
        Spi::run(schema::CREATE_SEQUENCE_COUNTERS).unwrap();
    }

    #[pg_test]
    fn allocates_sequentially_per_prefix() {
        assert_eq!(emz_allocate_sequence("LV-SPD"), 1);
        assert_eq!(emz_allocate_sequence("LV-SPD"), 2);
        assert_eq!(emz_allocate_sequence("CH-FLP"), 1);
        assert_eq!(emz_allocate_sequence("LV-SPD"), 3);

        let stored = Spi::get_one::<i64>(
            "SELECT last_value FROM emz_sequence_counters WHERE prefix = 'LV-SPD'",
        )
        .unwrap()
        .unwrap();
        assert_eq!(stored, 3);
    }

    #[pg_test]
    fn next_item_number_from_sql() {
        Spi::run("INSERT INTO emz_sequence_counters VALUES ('BR-GEN-GEN', 1249)").unwrap();
        let number = Spi::get_one::<String>("SELECT emz_next_item_number('Atelier', '???')")
            .unwrap()
            .unwrap();
        assert_eq!(number, "BR-GEN-GEN-EMZ-1250");
    }

    #[pg_test(error = "invariant violated for `PG-BAD`: last_value -4 after increment")]
    fn corrupt_counter_is_an_error() {
        Spi::run("INSERT INTO emz_sequence_counters VALUES ('PG-BAD', -5)").unwrap();
        emz_allocate_sequence("PG-BAD");
    }

    #[pg_test(error = "validation failed: `lv spd` is not a `BRAND-MODEL` prefix")]
    fn rejects_malformed_prefix() {
        emz_allocate_sequence("lv spd");
    }
}

/// This module is required by `cargo pgrx test` invocations.
/// It must be visible at the root of your extension crate.
#[cfg(test)]
pub mod pg_test {
    pub fn setup(_options: Vec<&str>) {
        // Perform one-off initialization when the pg_test framework starts
    }

    pub fn postgresql_conf_options() -> Vec<&'static str> {
        // Return custom postgresql.conf settings for testing
        vec![]
    }
}
