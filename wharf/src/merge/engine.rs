use std::collections::HashSet;

use chrono::{Duration, Utc};
use tracing::info;

use crate::error::{ErrorKind, WharfResult};
use crate::merge::plan::{OpenVersion, compute_plan, key_of};
use crate::sql;
use crate::store::{QueryOutput, TargetStore};
use crate::types::{
    Cell, EntityMapping, MergeCounts, StagedRow, TableRef, TrackingMode, open_end_sentinel,
};
use crate::{bail, wharf_error};

/// Where the source's full key set comes from for deletion detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionProbe {
    /// The staged snapshot is itself the full key set (full-extract sources).
    StagingKeys,
    /// The companion key staging table holds the full key set.
    CompanionTable,
}

/// Reconciles one entity's staged snapshot into its warehouse target.
///
/// Reads the staged rows and the target's open state, computes the row
/// operations, and applies them under the entity's tracking mode. The caller
/// owns transaction control; nothing here commits.
pub async fn merge(
    store: &dyn TargetStore,
    mapping: &EntityMapping,
    probe: DeletionProbe,
) -> WharfResult<MergeCounts> {
    let staged_sql = sql::select_staged(&mapping.source, &mapping.source_columns)?;
    let staged = parse_staged(
        store.query(&staged_sql, &[]).await?,
        mapping.source_columns.len(),
    )?;

    let counts = match mapping.mode {
        TrackingMode::Append => merge_append(store, mapping, &staged).await?,
        TrackingMode::Overwrite => merge_overwrite(store, mapping, &staged).await?,
        TrackingMode::Historize => merge_historize(store, mapping, &staged, probe).await?,
    };

    info!(
        schema = %mapping.target.schema,
        table = %mapping.target.table,
        mode = ?mapping.mode,
        %counts,
        "merged entity"
    );

    Ok(counts)
}

async fn merge_append(
    store: &dyn TargetStore,
    mapping: &EntityMapping,
    staged: &[StagedRow],
) -> WharfResult<MergeCounts> {
    let existing = key_set(
        store
            .query(&sql::select_keys(&mapping.target, &mapping.target_keys)?, &[])
            .await?,
    );

    let key_indices = mapping.source_key_indices();
    let plan = compute_plan(
        TrackingMode::Append,
        &key_indices,
        staged,
        &[],
        &existing,
        None,
    );

    let inserted = insert_rows(store, &mapping.target, &mapping.target_columns, &plan.inserts).await?;

    Ok(MergeCounts {
        deleted: 0,
        updated: 0,
        inserted,
    })
}

async fn merge_overwrite(
    store: &dyn TargetStore,
    mapping: &EntityMapping,
    staged: &[StagedRow],
) -> WharfResult<MergeCounts> {
    let current_sql = sql::select_current(&mapping.target, &mapping.target_columns)?;
    let current: Vec<OpenVersion> = store
        .query(&current_sql, &[])
        .await?
        .rows
        .into_iter()
        .map(|row| OpenVersion {
            values: row.into_values(),
            deleted: false,
        })
        .collect();

    let key_indices = mapping.source_key_indices();
    let existing: HashSet<Vec<Cell>> = current
        .iter()
        .map(|version| key_of(&version.values, &key_indices))
        .collect();

    let plan = compute_plan(
        TrackingMode::Overwrite,
        &key_indices,
        staged,
        &current,
        &existing,
        None,
    );

    let mut updated = 0;
    if !plan.rewrites.is_empty() {
        let update_sql = sql::update_overwrite(
            &mapping.target,
            &mapping.target_value_columns(),
            &mapping.target_keys,
        )?;
        let value_indices = value_indices(mapping);
        let rows: Vec<Vec<Cell>> = plan
            .rewrites
            .iter()
            .map(|row| {
                let mut params: Vec<Cell> = value_indices
                    .iter()
                    .map(|&index| row.values[index].clone())
                    .collect();
                params.push(Cell::Timestamp(row.create_dt));
                params.extend(key_of(&row.values, &key_indices));
                params
            })
            .collect();
        updated = store.insert(&update_sql, &rows).await?;
    }

    let inserted = insert_rows(store, &mapping.target, &mapping.target_columns, &plan.inserts).await?;

    Ok(MergeCounts {
        deleted: 0,
        updated,
        inserted,
    })
}

async fn merge_historize(
    store: &dyn TargetStore,
    mapping: &EntityMapping,
    staged: &[StagedRow],
    probe: DeletionProbe,
) -> WharfResult<MergeCounts> {
    let sentinel = open_end_sentinel();

    let open_sql = sql::select_open_versions(&mapping.target, &mapping.target_columns)?;
    let open = parse_open_versions(
        store
            .query(&open_sql, &[Cell::Timestamp(sentinel)])
            .await?,
        mapping.target_columns.len(),
    )?;

    let existing = key_set(
        store
            .query(
                &sql::select_distinct_keys(&mapping.target, &mapping.target_keys)?,
                &[],
            )
            .await?,
    );

    let key_indices = mapping.source_key_indices();
    let candidates = match probe {
        DeletionProbe::StagingKeys => staged
            .iter()
            .map(|row| key_of(&row.values, &key_indices))
            .collect(),
        DeletionProbe::CompanionTable => {
            let table = mapping.deletion_staging_table();
            key_set(
                store
                    .query(&sql::select_keys(&table, &mapping.source_keys)?, &[])
                    .await?,
            )
        }
    };

    let plan = compute_plan(
        TrackingMode::Historize,
        &key_indices,
        staged,
        &open,
        &existing,
        Some(&candidates),
    );

    let close_sql = sql::close_open_version(&mapping.target, &mapping.target_keys)?;
    let version_sql = sql::insert_version(&mapping.target, &mapping.target_columns)?;
    let now = Utc::now().naive_utc();

    let mut deleted = 0;
    if !plan.tombstones.is_empty() {
        let closed_at = now - Duration::seconds(1);
        let closes: Vec<Vec<Cell>> = plan
            .tombstones
            .iter()
            .map(|tombstone| close_params(&tombstone.key, closed_at, sentinel))
            .collect();
        deleted = store.insert(&close_sql, &closes).await?;

        let tombstones: Vec<Vec<Cell>> = plan
            .tombstones
            .iter()
            .map(|tombstone| version_params(&tombstone.last_values, now, sentinel, true))
            .collect();
        store.insert(&version_sql, &tombstones).await?;
    }

    let mut updated = 0;
    if !plan.rewrites.is_empty() {
        let closes: Vec<Vec<Cell>> = plan
            .rewrites
            .iter()
            .map(|row| {
                close_params(
                    &key_of(&row.values, &key_indices),
                    row.create_dt - Duration::seconds(1),
                    sentinel,
                )
            })
            .collect();
        updated = store.insert(&close_sql, &closes).await?;

        let reopened: Vec<Vec<Cell>> = plan
            .rewrites
            .iter()
            .map(|row| version_params(&row.values, row.create_dt, sentinel, false))
            .collect();
        store.insert(&version_sql, &reopened).await?;
    }

    let mut inserted = 0;
    if !plan.inserts.is_empty() {
        let rows: Vec<Vec<Cell>> = plan
            .inserts
            .iter()
            .map(|row| version_params(&row.values, row.create_dt, sentinel, false))
            .collect();
        inserted = store.insert(&version_sql, &rows).await?;
    }

    Ok(MergeCounts {
        deleted,
        updated,
        inserted,
    })
}

async fn insert_rows(
    store: &dyn TargetStore,
    target: &TableRef,
    columns: &[String],
    inserts: &[StagedRow],
) -> WharfResult<u64> {
    if inserts.is_empty() {
        return Ok(0);
    }

    let insert_sql = sql::insert_target(target, columns)?;
    let rows: Vec<Vec<Cell>> = inserts
        .iter()
        .map(|row| {
            let mut params = row.values.clone();
            params.push(Cell::Timestamp(row.create_dt));
            params
        })
        .collect();

    store.insert(&insert_sql, &rows).await
}

fn close_params(
    key: &[Cell],
    closed_at: chrono::NaiveDateTime,
    sentinel: chrono::NaiveDateTime,
) -> Vec<Cell> {
    let mut params = vec![Cell::Timestamp(closed_at)];
    params.extend_from_slice(key);
    params.push(Cell::Timestamp(sentinel));
    params
}

fn version_params(
    values: &[Cell],
    effective_from: chrono::NaiveDateTime,
    sentinel: chrono::NaiveDateTime,
    deleted: bool,
) -> Vec<Cell> {
    let mut params = values.to_vec();
    params.push(Cell::Timestamp(effective_from));
    params.push(Cell::Timestamp(sentinel));
    params.push(Cell::Bool(deleted));
    params
}

fn value_indices(mapping: &EntityMapping) -> Vec<usize> {
    mapping
        .target_columns
        .iter()
        .enumerate()
        .filter(|(_, column)| !mapping.target_keys.contains(column))
        .map(|(index, _)| index)
        .collect()
}

fn key_set(output: QueryOutput) -> HashSet<Vec<Cell>> {
    output
        .rows
        .into_iter()
        .map(|row| row.into_values())
        .collect()
}

pub(crate) fn parse_staged(output: QueryOutput, arity: usize) -> WharfResult<Vec<StagedRow>> {
    let mut rows = Vec::with_capacity(output.rows.len());
    for row in output.rows {
        let mut values = row.into_values();
        if values.len() != arity + 1 {
            bail!(
                ErrorKind::SchemaMismatch,
                "staged row has unexpected column count",
                format!("expected {} columns, found {}", arity + 1, values.len())
            );
        }
        let create_dt = match values.pop() {
            Some(Cell::Timestamp(ts)) => ts,
            other => {
                return Err(wharf_error!(
                    ErrorKind::ConversionError,
                    "staged row carries no change timestamp",
                    format!("{other:?}")
                ));
            }
        };
        rows.push(StagedRow::new(values, create_dt));
    }
    Ok(rows)
}

fn parse_open_versions(output: QueryOutput, arity: usize) -> WharfResult<Vec<OpenVersion>> {
    let mut versions = Vec::with_capacity(output.rows.len());
    for row in output.rows {
        let mut values = row.into_values();
        if values.len() != arity + 1 {
            bail!(
                ErrorKind::SchemaMismatch,
                "open version row has unexpected column count",
                format!("expected {} columns, found {}", arity + 1, values.len())
            );
        }
        let deleted = match values.pop() {
            Some(Cell::Bool(flag)) => flag,
            Some(Cell::Null) => false,
            other => {
                return Err(wharf_error!(
                    ErrorKind::ConversionError,
                    "open version row carries no deletion flag",
                    format!("{other:?}")
                ));
            }
        };
        versions.push(OpenVersion { values, deleted });
    }
    Ok(versions)
}
