//! Staging loads: clear-then-insert of extracted snapshots.
//!
//! A staging table holds exactly one snapshot at a time and is cleared on
//! every load. Inserts are gated by the entity's watermark so that
//! re-delivered or stale extracts do not overwrite a newer snapshot with old
//! data; forced loads bypass the gate for sources that always deliver the
//! full current state.

use chrono::NaiveDateTime;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, WharfResult};
use crate::sql;
use crate::store::TargetStore;
use crate::types::{Cell, EntityMapping, StageCounts, StagedRow};

/// Outcome of one staging load.
///
/// `stale` marks a gated batch: staging was cleared but nothing was inserted,
/// and the caller should skip the merge for this entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageLoad {
    pub counts: StageCounts,
    pub stale: bool,
}

/// Loads one extracted snapshot into the entity's staging table.
///
/// The staging table is always cleared first. The gate compares the newest
/// `create_dt` in the extract against the stored watermark; a stale or empty
/// extract leaves staging empty and is reported back so the merge can be
/// skipped. Row arity is checked against the mapping before any statement
/// runs.
pub async fn load(
    store: &dyn TargetStore,
    mapping: &EntityMapping,
    rows: &[StagedRow],
    watermark: NaiveDateTime,
    force: bool,
) -> WharfResult<StageLoad> {
    let arity = mapping.source_columns.len();
    for row in rows {
        if row.values.len() != arity {
            bail!(
                ErrorKind::SchemaMismatch,
                "extracted row does not match the mapped source columns",
                format!(
                    "{}.{}: expected {arity} values, found {}",
                    mapping.source.schema,
                    mapping.source.table,
                    row.values.len()
                )
            );
        }
    }

    let stale = !force && {
        match rows.iter().map(|row| row.create_dt).max() {
            Some(newest) => newest <= watermark,
            None => true,
        }
    };

    let deleted = store
        .execute(&sql::delete_all(&mapping.source)?, &[])
        .await?;

    if stale {
        info!(
            schema = %mapping.source.schema,
            table = %mapping.source.table,
            %watermark,
            deleted,
            "extract is not newer than the watermark, staging cleared without insert"
        );
        return Ok(StageLoad {
            counts: StageCounts { deleted, inserted: 0 },
            stale: true,
        });
    }

    let insert = sql::insert_staging(&mapping.source, &mapping.source_columns)?;
    let params: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            let mut values = row.values.clone();
            values.push(Cell::Timestamp(row.create_dt));
            values
        })
        .collect();
    let inserted = store.insert(&insert, &params).await?;

    info!(
        schema = %mapping.source.schema,
        table = %mapping.source.table,
        deleted,
        inserted,
        "staged extract"
    );

    Ok(StageLoad {
        counts: StageCounts { deleted, inserted },
        stale: false,
    })
}

/// Loads the source's full key set into the companion deletion staging table.
///
/// Key snapshots are always full and always loaded; there is no watermark gate.
pub async fn load_keys(
    store: &dyn TargetStore,
    mapping: &EntityMapping,
    keys: &[Vec<Cell>],
) -> WharfResult<StageCounts> {
    let arity = mapping.source_keys.len();
    for key in keys {
        if key.len() != arity {
            bail!(
                ErrorKind::SchemaMismatch,
                "key row does not match the mapped key columns",
                format!("expected {arity} values, found {}", key.len())
            );
        }
    }

    let table = mapping.deletion_staging_table();
    let deleted = store.execute(&sql::delete_all(&table)?, &[]).await?;
    let insert = sql::insert_staging_keys(&table, &mapping.source_keys)?;
    let inserted = store.insert(&insert, keys).await?;

    Ok(StageCounts { deleted, inserted })
}
