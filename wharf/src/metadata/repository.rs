use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::info;
use wharf_config::shared::MetadataConfig;

use crate::error::{ErrorKind, WharfResult};
use crate::sql;
use crate::store::TargetStore;
use crate::types::{Cell, EntityMapping, TableRef, TrackingMode, never_processed};
use crate::{bail, wharf_error};

/// In-memory snapshot of the mapping and watermark tables.
///
/// Loaded once at run start; mappings and watermarks do not change within a run.
/// The watermark table is updated in place as entities are staged, but the
/// snapshot here is only used to gate loads, so it intentionally stays at the
/// run-start values.
pub struct MappingRepository {
    mappings: HashMap<(String, String), EntityMapping>,
    watermarks: HashMap<(String, String), NaiveDateTime>,
}

impl MappingRepository {
    /// Reads the full mapping and watermark tables from the metadata schema.
    ///
    /// Each mapping is validated on load; a malformed row fails the whole run
    /// rather than silently skipping the entity.
    pub async fn load(store: &dyn TargetStore, meta: &MetadataConfig) -> WharfResult<Self> {
        let mut mappings = HashMap::new();
        let output = store.query(&sql::select_mappings(meta)?, &[]).await?;
        for row in output.rows {
            let mapping = parse_mapping(row.into_values())?;
            mapping.validate()?;
            let key = (mapping.source.schema.clone(), mapping.source.table.clone());
            mappings.insert(key, mapping);
        }

        let mut watermarks = HashMap::new();
        let output = store.query(&sql::select_watermarks(meta)?, &[]).await?;
        for row in output.rows {
            let mut values = row.into_values().into_iter();
            let schema = take_string(values.next(), "schema_name")?;
            let table = take_string(values.next(), "table_name")?;
            // A watermark row may exist before its entity's first load; a NULL
            // mark means never processed.
            let mark = match values.next() {
                Some(Cell::Null) => never_processed(),
                cell => take_timestamp(cell, "max_update_dt")?,
            };
            watermarks.insert((schema, table), mark);
        }

        info!(
            mappings = mappings.len(),
            watermarks = watermarks.len(),
            "loaded entity metadata"
        );

        Ok(Self {
            mappings,
            watermarks,
        })
    }

    /// Returns the mapping whose staging table is `staging`.
    ///
    /// An entity without a mapping row is a configuration fault and fails with
    /// [`ErrorKind::MappingNotFound`].
    pub fn lookup(&self, staging: &TableRef) -> WharfResult<&EntityMapping> {
        match self
            .mappings
            .get(&(staging.schema.clone(), staging.table.clone()))
        {
            Some(mapping) => Ok(mapping),
            None => bail!(
                ErrorKind::MappingNotFound,
                "no entity mapping for staging table",
                format!("{}.{}", staging.schema, staging.table)
            ),
        }
    }

    /// Returns the stored watermark for a staging table.
    ///
    /// Entities without a stored mark get the never-processed floor, so their
    /// first load always passes the gate.
    pub fn watermark(&self, staging: &TableRef) -> NaiveDateTime {
        self.watermarks
            .get(&(staging.schema.clone(), staging.table.clone()))
            .copied()
            .unwrap_or_else(never_processed)
    }

    /// Number of loaded mappings.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// True when the mapping table was empty.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn parse_mapping(values: Vec<Cell>) -> WharfResult<EntityMapping> {
    if values.len() != 9 {
        bail!(
            ErrorKind::SchemaMismatch,
            "mapping row has unexpected column count",
            format!("expected 9 columns, found {}", values.len())
        );
    }

    let mut values = values.into_iter();
    Ok(EntityMapping {
        target: TableRef::new(
            take_string(values.next(), "target_schema_name")?,
            take_string(values.next(), "target_table_name")?,
        ),
        target_columns: take_text_array(values.next(), "target_columns")?,
        target_keys: take_text_array(values.next(), "target_keys")?,
        mode: TrackingMode::from_code(take_integer(values.next(), "scd")?),
        source: TableRef::new(
            take_string(values.next(), "source_schema_name")?,
            take_string(values.next(), "source_table_name")?,
        ),
        source_columns: take_text_array(values.next(), "source_columns")?,
        source_keys: take_text_array(values.next(), "source_keys")?,
    })
}

fn take_string(cell: Option<Cell>, column: &str) -> WharfResult<String> {
    match cell {
        Some(Cell::String(value)) => Ok(value),
        other => Err(unexpected_cell(column, other)),
    }
}

fn take_text_array(cell: Option<Cell>, column: &str) -> WharfResult<Vec<String>> {
    match cell {
        Some(Cell::TextArray(values)) => Ok(values),
        other => Err(unexpected_cell(column, other)),
    }
}

fn take_integer(cell: Option<Cell>, column: &str) -> WharfResult<i32> {
    match cell {
        Some(Cell::I16(value)) => Ok(i32::from(value)),
        Some(Cell::I32(value)) => Ok(value),
        Some(Cell::I64(value)) => Ok(value as i32),
        other => Err(unexpected_cell(column, other)),
    }
}

fn take_timestamp(cell: Option<Cell>, column: &str) -> WharfResult<NaiveDateTime> {
    match cell {
        Some(Cell::Timestamp(value)) => Ok(value),
        other => Err(unexpected_cell(column, other)),
    }
}

fn unexpected_cell(column: &str, cell: Option<Cell>) -> crate::error::WharfError {
    wharf_error!(
        ErrorKind::ConversionError,
        "unexpected value in metadata row",
        format!("column {column}: {cell:?}")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping_cells() -> Vec<Cell> {
        vec![
            Cell::String("core".into()),
            Cell::String("cards".into()),
            Cell::TextArray(vec!["card_num".into(), "status".into()]),
            Cell::TextArray(vec!["card_num".into()]),
            Cell::I16(2),
            Cell::String("stage".into()),
            Cell::String("stg_cards".into()),
            Cell::TextArray(vec!["card_num".into(), "status".into()]),
            Cell::TextArray(vec!["card_num".into()]),
        ]
    }

    #[test]
    fn mapping_row_parses() {
        let mapping = parse_mapping(mapping_cells()).unwrap();
        assert_eq!(mapping.target, TableRef::new("core", "cards"));
        assert_eq!(mapping.source, TableRef::new("stage", "stg_cards"));
        assert_eq!(mapping.mode, TrackingMode::Historize);
        assert_eq!(mapping.target_keys, vec!["card_num"]);
    }

    #[test]
    fn short_mapping_row_is_rejected() {
        let mut cells = mapping_cells();
        cells.pop();
        let err = parse_mapping(cells).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn wrong_cell_type_is_rejected() {
        let mut cells = mapping_cells();
        cells[4] = Cell::String("historize".into());
        let err = parse_mapping(cells).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }

    #[tokio::test]
    async fn null_watermark_means_never_processed() {
        use crate::store::QueryOutput;
        use crate::test_utils::RecordingStore;
        use crate::types::TableRow;

        let store = RecordingStore::new();
        store.script_query(QueryOutput {
            columns: Vec::new(),
            rows: vec![TableRow::new(mapping_cells())],
        });
        store.script_query(QueryOutput {
            columns: Vec::new(),
            rows: vec![TableRow::new(vec![
                Cell::String("stage".into()),
                Cell::String("stg_cards".into()),
                Cell::Null,
            ])],
        });

        let repository = MappingRepository::load(&store, &MetadataConfig::default())
            .await
            .unwrap();

        assert_eq!(
            repository.watermark(&TableRef::new("stage", "stg_cards")),
            never_processed()
        );
    }
}
