use chrono::NaiveDateTime;
use tracing::info;

use crate::error::WharfResult;
use crate::merge::engine::parse_staged;
use crate::sql;
use crate::store::TargetStore;
use crate::types::{Cell, StagedRow, TableRef};

/// Reads the rows of a source table changed since `watermark`.
///
/// Each row keeps its own source modification time, taken from `update_dt` when
/// set and `create_dt` otherwise.
pub async fn fetch_changed(
    source: &dyn TargetStore,
    table: &TableRef,
    columns: &[String],
    watermark: NaiveDateTime,
) -> WharfResult<Vec<StagedRow>> {
    let statement = sql::select_changed(table, columns)?;
    let output = source
        .query(&statement, &[Cell::Timestamp(watermark)])
        .await?;
    let rows = parse_staged(output, columns.len())?;

    info!(
        schema = %table.schema,
        table = %table.table,
        %watermark,
        rows = rows.len(),
        "fetched changed rows"
    );

    Ok(rows)
}

/// Reads the full key set of a source table, for deletion detection.
pub async fn fetch_key_set(
    source: &dyn TargetStore,
    table: &TableRef,
    keys: &[String],
) -> WharfResult<Vec<Vec<Cell>>> {
    let statement = sql::select_keys(table, keys)?;
    let output = source.query(&statement, &[]).await?;

    Ok(output
        .rows
        .into_iter()
        .map(|row| row.into_values())
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::store::QueryOutput;
    use crate::test_utils::RecordingStore;
    use crate::types::TableRow;

    #[tokio::test]
    async fn changed_rows_keep_their_own_timestamps() {
        let store = RecordingStore::new();
        let first = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let second = NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        store.script_query(QueryOutput {
            columns: Vec::new(),
            rows: vec![
                TableRow::new(vec![Cell::String("1".into()), Cell::Timestamp(first)]),
                TableRow::new(vec![Cell::String("2".into()), Cell::Timestamp(second)]),
            ],
        });

        let table = TableRef::new("info", "cards");
        let rows = fetch_changed(&store, &table, &["card_num".into()], first)
            .await
            .unwrap();

        assert_eq!(rows[0].create_dt, first);
        assert_eq!(rows[1].create_dt, second);
    }
}
