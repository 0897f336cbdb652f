use chrono::{NaiveDateTime, Utc};
use tracing::info;
use wharf_config::shared::MetadataConfig;

use crate::error::{ErrorKind, WharfResult};
use crate::sql;
use crate::store::TargetStore;
use crate::types::{Cell, MergeCounts, TableRef};
use crate::{bail, wharf_error};

/// Audit trail of one loader run.
///
/// The run identifier is issued by a database sequence so that concurrent runs
/// never collide. Each load stage appends one row carrying the stage's row
/// counts; [`RunAuditLog::end_run`] stamps the end timestamp on all of them.
pub struct RunAuditLog {
    run_id: i64,
    run_start: NaiveDateTime,
}

impl RunAuditLog {
    /// Opens the audit trail by drawing the next run identifier.
    pub async fn begin(store: &dyn TargetStore, meta: &MetadataConfig) -> WharfResult<Self> {
        let output = store.query(&sql::next_run_id(meta)?, &[]).await?;
        let run_id = match output.rows.first().and_then(|row| row.values().first()) {
            Some(Cell::I64(id)) => *id,
            other => bail!(
                ErrorKind::ConversionError,
                "run sequence returned no usable value",
                format!("{other:?}")
            ),
        };

        info!(run_id, "run started");

        Ok(Self {
            run_id,
            run_start: Utc::now().naive_utc(),
        })
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Records the row counts of one load stage against a table.
    pub async fn record_stage(
        &self,
        store: &dyn TargetStore,
        meta: &MetadataConfig,
        table: &TableRef,
        counts: MergeCounts,
    ) -> WharfResult<()> {
        let params = [
            Cell::I64(self.run_id),
            Cell::String(table.schema.clone()),
            Cell::String(table.table.clone()),
            Cell::I64(as_count(counts.deleted)?),
            Cell::I64(as_count(counts.updated)?),
            Cell::I64(as_count(counts.inserted)?),
            Cell::Timestamp(self.run_start),
        ];
        store.execute(&sql::insert_run_log(meta)?, &params).await?;

        Ok(())
    }

    /// Stamps the run end timestamp on every audit row of this run.
    pub async fn end_run(&self, store: &dyn TargetStore, meta: &MetadataConfig) -> WharfResult<()> {
        store
            .execute(&sql::stamp_run_end(meta)?, &[Cell::I64(self.run_id)])
            .await?;

        info!(run_id = self.run_id, "run finished");

        Ok(())
    }
}

fn as_count(value: u64) -> WharfResult<i64> {
    i64::try_from(value).map_err(|_| {
        wharf_error!(
            ErrorKind::ConversionError,
            "row count exceeds the audit column range",
            value.to_string()
        )
    })
}
