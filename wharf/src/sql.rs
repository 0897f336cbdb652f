//! Statement construction for the loader.
//!
//! Every statement the loader issues is built here. Value positions are always bind
//! parameters (`$n`); identifiers are interpolated only after passing
//! [`validate_ident`], and they are only ever drawn from validated metadata, never
//! from row data.

use wharf_config::shared::MetadataConfig;

use crate::bail;
use crate::error::{ErrorKind, WharfResult};
use crate::types::TableRef;

/// Checks that a name is usable as a schema, table, or column identifier.
///
/// Accepts `[A-Za-z_][A-Za-z0-9_]*`. Anything else fails with
/// [`ErrorKind::InvalidIdentifier`].
pub fn validate_ident(name: &str) -> WharfResult<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if !valid {
        bail!(
            ErrorKind::InvalidIdentifier,
            "name is not a valid SQL identifier",
            name.to_owned()
        );
    }

    Ok(name)
}

/// Returns the schema-qualified name of a table, vetting both parts.
pub fn qualify(table: &TableRef) -> WharfResult<String> {
    Ok(format!(
        "{}.{}",
        validate_ident(&table.schema)?,
        validate_ident(&table.table)?
    ))
}

/// Joins column names into a comma-separated list, vetting each.
fn column_list<S: AsRef<str>>(columns: &[S]) -> WharfResult<String> {
    let mut parts = Vec::with_capacity(columns.len());
    for column in columns {
        parts.push(validate_ident(column.as_ref())?.to_owned());
    }
    Ok(parts.join(", "))
}

/// Generates `$start, $start+1, ..` placeholders for `count` parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|n| format!("${n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Generates `k1 = $start AND k2 = $start+1 ..` for a key match.
fn key_match<S: AsRef<str>>(keys: &[S], start: usize) -> WharfResult<String> {
    let mut parts = Vec::with_capacity(keys.len());
    for (offset, key) in keys.iter().enumerate() {
        parts.push(format!(
            "{} = ${}",
            validate_ident(key.as_ref())?,
            start + offset
        ));
    }
    Ok(parts.join(" AND "))
}

/// `DELETE FROM <table>` clearing a staging table before a load.
pub fn delete_all(table: &TableRef) -> WharfResult<String> {
    Ok(format!("DELETE FROM {}", qualify(table)?))
}

/// Insert of one staged row: business columns plus `create_dt`, with `processed_dt`
/// stamped by the database.
pub fn insert_staging<S: AsRef<str>>(table: &TableRef, columns: &[S]) -> WharfResult<String> {
    Ok(format!(
        "INSERT INTO {}({}, create_dt, processed_dt) VALUES ({}, NOW())",
        qualify(table)?,
        column_list(columns)?,
        placeholders(1, columns.len() + 1),
    ))
}

/// Insert of one deletion-candidate key row into the companion staging table.
pub fn insert_staging_keys<S: AsRef<str>>(table: &TableRef, keys: &[S]) -> WharfResult<String> {
    Ok(format!(
        "INSERT INTO {}({}, processed_dt) VALUES ({}, NOW())",
        qualify(table)?,
        column_list(keys)?,
        placeholders(1, keys.len()),
    ))
}

/// Reads the staged snapshot with each row's change timestamp.
pub fn select_staged<S: AsRef<str>>(table: &TableRef, columns: &[S]) -> WharfResult<String> {
    Ok(format!(
        "SELECT {}, create_dt FROM {}",
        column_list(columns)?,
        qualify(table)?
    ))
}

/// Reads the key columns of every row in a table.
pub fn select_keys<S: AsRef<str>>(table: &TableRef, keys: &[S]) -> WharfResult<String> {
    Ok(format!(
        "SELECT {} FROM {}",
        column_list(keys)?,
        qualify(table)?
    ))
}

/// Reads the distinct key set across all versions of a target table.
pub fn select_distinct_keys<S: AsRef<str>>(table: &TableRef, keys: &[S]) -> WharfResult<String> {
    Ok(format!(
        "SELECT DISTINCT {} FROM {}",
        column_list(keys)?,
        qualify(table)?
    ))
}

/// Reads the current rows of an append/overwrite target.
pub fn select_current<S: AsRef<str>>(table: &TableRef, columns: &[S]) -> WharfResult<String> {
    Ok(format!(
        "SELECT {} FROM {}",
        column_list(columns)?,
        qualify(table)?
    ))
}

/// Reads the open versions of a historized target, including tombstones.
///
/// `$1` binds the open-ended `effective_to` sentinel.
pub fn select_open_versions<S: AsRef<str>>(table: &TableRef, columns: &[S]) -> WharfResult<String> {
    Ok(format!(
        "SELECT {}, deleted_flg FROM {} WHERE effective_to = $1",
        column_list(columns)?,
        qualify(table)?
    ))
}

/// In-place overwrite of one key's non-key columns (SCD1).
///
/// Parameters: value columns, then `update_dt`, then the key columns.
pub fn update_overwrite<S: AsRef<str>, K: AsRef<str>>(
    table: &TableRef,
    value_columns: &[S],
    keys: &[K],
) -> WharfResult<String> {
    let mut assignments = Vec::with_capacity(value_columns.len() + 1);
    for (index, column) in value_columns.iter().enumerate() {
        assignments.push(format!("{} = ${}", validate_ident(column.as_ref())?, index + 1));
    }
    assignments.push(format!("update_dt = ${}", value_columns.len() + 1));

    Ok(format!(
        "UPDATE {} SET {}, processed_dt = NOW() WHERE {}",
        qualify(table)?,
        assignments.join(", "),
        key_match(keys, value_columns.len() + 2)?,
    ))
}

/// Closes one key's open version (SCD2).
///
/// Parameters: the new `effective_to`, the key columns, then the open-ended
/// sentinel the version currently carries.
pub fn close_open_version<S: AsRef<str>>(table: &TableRef, keys: &[S]) -> WharfResult<String> {
    Ok(format!(
        "UPDATE {} SET effective_to = $1, processed_dt = NOW() WHERE {} AND effective_to = ${}",
        qualify(table)?,
        key_match(keys, 2)?,
        keys.len() + 2,
    ))
}

/// Inserts one historized version (SCD2).
///
/// Parameters: business columns, `effective_from`, `effective_to`, `deleted_flg`.
pub fn insert_version<S: AsRef<str>>(table: &TableRef, columns: &[S]) -> WharfResult<String> {
    Ok(format!(
        "INSERT INTO {}({}, effective_from, effective_to, deleted_flg, processed_dt) VALUES ({}, NOW())",
        qualify(table)?,
        column_list(columns)?,
        placeholders(1, columns.len() + 3),
    ))
}

/// Inserts one row into an append/overwrite target.
///
/// Parameters: business columns, then `create_dt`.
pub fn insert_target<S: AsRef<str>>(table: &TableRef, columns: &[S]) -> WharfResult<String> {
    Ok(format!(
        "INSERT INTO {}({}, create_dt, processed_dt) VALUES ({}, NOW())",
        qualify(table)?,
        column_list(columns)?,
        placeholders(1, columns.len() + 1),
    ))
}

/// Reads the changed rows of a source database table since a watermark.
///
/// `$1` binds the watermark. The change timestamp is surfaced as `create_dt`.
pub fn select_changed<S: AsRef<str>>(table: &TableRef, columns: &[S]) -> WharfResult<String> {
    Ok(format!(
        "SELECT {}, COALESCE(update_dt, create_dt) AS create_dt FROM {} \
         WHERE COALESCE(update_dt, create_dt) > $1",
        column_list(columns)?,
        qualify(table)?
    ))
}

/// Reads the full entity mapping table.
pub fn select_mappings(meta: &MetadataConfig) -> WharfResult<String> {
    Ok(format!(
        "SELECT target_schema_name, target_table_name, target_columns, target_keys, scd, \
         source_schema_name, source_table_name, source_columns, source_keys FROM {}",
        qualify(&meta_table(meta, &meta.mapping_table))?
    ))
}

/// Reads all stored watermarks.
pub fn select_watermarks(meta: &MetadataConfig) -> WharfResult<String> {
    Ok(format!(
        "SELECT schema_name, table_name, max_update_dt FROM {}",
        qualify(&meta_table(meta, &meta.watermark_table))?
    ))
}

/// Advances one entity's watermark from the maximum staged `create_dt`.
///
/// The mark moves only when the staged maximum is strictly greater; an empty
/// staging table yields NULL and leaves the mark untouched. `$1`/`$2` bind the
/// staging schema and table names as stored in the watermark table.
pub fn advance_watermark(meta: &MetadataConfig, staging: &TableRef) -> WharfResult<String> {
    let staged_max = format!("(SELECT MAX(create_dt) FROM {})", qualify(staging)?);
    Ok(format!(
        "UPDATE {} SET max_update_dt = {staged_max}, processed_dt = NOW() \
         WHERE schema_name = $1 AND table_name = $2 AND max_update_dt < {staged_max}",
        qualify(&meta_table(meta, &meta.watermark_table))?,
    ))
}

/// Draws the next run identifier from the shared run sequence.
pub fn next_run_id(meta: &MetadataConfig) -> WharfResult<String> {
    Ok(format!(
        "SELECT nextval('{}')",
        qualify(&meta_table(meta, &meta.run_sequence))?
    ))
}

/// Inserts one audit row for a run stage.
///
/// Parameters: run id, schema, table, deleted, updated, inserted, run start.
pub fn insert_run_log(meta: &MetadataConfig) -> WharfResult<String> {
    Ok(format!(
        "INSERT INTO {}(run_id, schema_name, table_name, rows_deleted, rows_updated, \
         rows_inserted, run_start_dt, processed_dt) VALUES ({}, NOW())",
        qualify(&meta_table(meta, &meta.run_log_table))?,
        placeholders(1, 7),
    ))
}

/// Stamps the run end timestamp on every audit row of a run.
pub fn stamp_run_end(meta: &MetadataConfig) -> WharfResult<String> {
    Ok(format!(
        "UPDATE {} SET run_end_dt = NOW() WHERE run_id = $1",
        qualify(&meta_table(meta, &meta.run_log_table))?
    ))
}

fn meta_table(meta: &MetadataConfig, table: &str) -> TableRef {
    TableRef::new(meta.schema.clone(), table.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn table() -> TableRef {
        TableRef::new("stage", "stg_cards")
    }

    #[test]
    fn identifiers_accept_word_characters_only() {
        assert!(validate_ident("stg_cards").is_ok());
        assert!(validate_ident("_hidden2").is_ok());
        assert!(validate_ident("").is_err());
        assert!(validate_ident("2cards").is_err());
        assert!(validate_ident("cards; DROP TABLE x").is_err());
        assert!(validate_ident("ca rds").is_err());
        assert!(validate_ident("cards\"").is_err());
    }

    #[test]
    fn qualify_vets_both_parts() {
        assert_eq!(qualify(&table()).unwrap(), "stage.stg_cards");
        let bad = TableRef::new("sta ge", "t");
        assert_eq!(
            qualify(&bad).unwrap_err().kind(),
            ErrorKind::InvalidIdentifier
        );
    }

    #[test]
    fn staging_insert_shape() {
        let sql = insert_staging(&table(), &["card_num", "status"]).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO stage.stg_cards(card_num, status, create_dt, processed_dt) \
             VALUES ($1, $2, $3, NOW())"
        );
    }

    #[test]
    fn key_staging_insert_shape() {
        let sql = insert_staging_keys(&table(), &["card_num"]).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO stage.stg_cards(card_num, processed_dt) VALUES ($1, NOW())"
        );
    }

    #[test]
    fn overwrite_update_shape() {
        let target = TableRef::new("core", "cards");
        let sql = update_overwrite(&target, &["account", "status"], &["card_num"]).unwrap();
        assert_eq!(
            sql,
            "UPDATE core.cards SET account = $1, status = $2, update_dt = $3, \
             processed_dt = NOW() WHERE card_num = $4"
        );
    }

    #[test]
    fn close_version_shape() {
        let target = TableRef::new("core", "cards");
        let sql = close_open_version(&target, &["card_num", "bank"]).unwrap();
        assert_eq!(
            sql,
            "UPDATE core.cards SET effective_to = $1, processed_dt = NOW() \
             WHERE card_num = $2 AND bank = $3 AND effective_to = $4"
        );
    }

    #[test]
    fn version_insert_shape() {
        let target = TableRef::new("core", "cards");
        let sql = insert_version(&target, &["card_num", "status"]).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO core.cards(card_num, status, effective_from, effective_to, \
             deleted_flg, processed_dt) VALUES ($1, $2, $3, $4, $5, NOW())"
        );
    }

    #[test]
    fn changed_rows_select_binds_watermark() {
        let source = TableRef::new("info", "cards");
        let sql = select_changed(&source, &["card_num", "status"]).unwrap();
        assert!(sql.contains("COALESCE(update_dt, create_dt) > $1"));
    }

    #[test]
    fn watermark_advance_guards_regression() {
        let meta = MetadataConfig::default();
        let sql = advance_watermark(&meta, &table()).unwrap();
        assert!(sql.contains("max_update_dt < (SELECT MAX(create_dt) FROM stage.stg_cards)"));
        assert!(sql.contains("schema_name = $1 AND table_name = $2"));
    }
}
