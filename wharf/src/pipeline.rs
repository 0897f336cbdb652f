//! Orchestration of one loader run.
//!
//! A run opens with the metadata snapshot and a fresh audit trail, processes any
//! number of entities, and closes by stamping the run end. Each entity commits
//! twice: once after its staging load and watermark advance, once after its
//! merge. A failure between the two leaves the staging tables loaded but the
//! warehouse untouched, and the next run redoes the merge from staging.

use tracing::info;
use wharf_config::shared::{MetadataConfig, StagingConfig};

use crate::error::WharfResult;
use crate::merge::{self, DeletionProbe};
use crate::metadata::{MappingRepository, RunAuditLog, advance_watermark};
use crate::source::{FileExtract, database};
use crate::staging;
use crate::store::TargetStore;
use crate::types::{MergeCounts, TableRef};

/// One loader run against the target warehouse.
pub struct LoadPipeline<'a> {
    store: &'a dyn TargetStore,
    meta: &'a MetadataConfig,
    staging: &'a StagingConfig,
    repository: MappingRepository,
    audit: RunAuditLog,
}

impl<'a> LoadPipeline<'a> {
    /// Opens a run: reads the metadata snapshot and draws a run identifier.
    pub async fn begin(
        store: &'a dyn TargetStore,
        meta: &'a MetadataConfig,
        staging: &'a StagingConfig,
    ) -> WharfResult<Self> {
        let repository = MappingRepository::load(store, meta).await?;
        let audit = RunAuditLog::begin(store, meta).await?;

        Ok(Self {
            store,
            meta,
            staging,
            repository,
            audit,
        })
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> i64 {
        self.audit.run_id()
    }

    /// Staging table of a logical entity.
    pub fn staging_ref(&self, entity: &str) -> TableRef {
        TableRef::new(
            self.staging.schema.clone(),
            format!("{}_{}", self.staging.prefix, entity),
        )
    }

    /// Processes one file extract end to end.
    ///
    /// A stale extract still clears the staging table and writes its staging
    /// audit row, but the merge is skipped and `None` is returned; the file is
    /// then left for the caller to archive.
    pub async fn process_file(&self, extract: &FileExtract) -> WharfResult<Option<MergeCounts>> {
        let staging_ref = self.staging_ref(extract.entity());
        let mapping = self.repository.lookup(&staging_ref)?;
        let watermark = self.repository.watermark(&staging_ref);

        let stage =
            staging::load(self.store, mapping, extract.staged_rows(), watermark, false).await?;
        advance_watermark(self.store, self.meta, &mapping.source).await?;
        self.audit
            .record_stage(self.store, self.meta, &mapping.source, stage.counts.into())
            .await?;
        self.store.commit().await?;

        if stage.stale {
            return Ok(None);
        }

        // A file drop is a full snapshot, so its key set doubles as the
        // deletion probe.
        let counts = merge::merge(self.store, mapping, DeletionProbe::StagingKeys).await?;
        self.audit
            .record_stage(self.store, self.meta, &mapping.target, counts)
            .await?;
        self.store.commit().await?;

        Ok(Some(counts))
    }

    /// Processes one database-sourced entity end to end.
    ///
    /// Changed rows are pulled incrementally from the source since the stored
    /// watermark; the source's full key set goes to the companion staging table
    /// for deletion detection.
    pub async fn process_database(
        &self,
        source: &dyn TargetStore,
        source_schema: &str,
        entity: &str,
    ) -> WharfResult<MergeCounts> {
        let staging_ref = self.staging_ref(entity);
        let mapping = self.repository.lookup(&staging_ref)?;
        let watermark = self.repository.watermark(&staging_ref);
        let origin = TableRef::new(source_schema, entity);

        let rows =
            database::fetch_changed(source, &origin, &mapping.source_columns, watermark).await?;
        let stage = staging::load(self.store, mapping, &rows, watermark, true).await?;
        advance_watermark(self.store, self.meta, &mapping.source).await?;
        self.audit
            .record_stage(self.store, self.meta, &mapping.source, stage.counts.into())
            .await?;
        self.store.commit().await?;

        let keys = database::fetch_key_set(source, &origin, &mapping.source_keys).await?;
        let key_stage = staging::load_keys(self.store, mapping, &keys).await?;
        self.audit
            .record_stage(
                self.store,
                self.meta,
                &mapping.deletion_staging_table(),
                key_stage.into(),
            )
            .await?;
        self.store.commit().await?;

        let counts = merge::merge(self.store, mapping, DeletionProbe::CompanionTable).await?;
        self.audit
            .record_stage(self.store, self.meta, &mapping.target, counts)
            .await?;
        self.store.commit().await?;

        Ok(counts)
    }

    /// Runs a stored report refresh script against the warehouse.
    ///
    /// The script is opaque SQL maintained alongside the warehouse schema; the
    /// affected row count is audited as the report table's inserted count and
    /// the refresh commits on its own.
    pub async fn process_report(&self, script: &str, report: &TableRef) -> WharfResult<MergeCounts> {
        let inserted = self.store.execute(script, &[]).await?;
        let counts = MergeCounts {
            deleted: 0,
            updated: 0,
            inserted,
        };
        self.audit
            .record_stage(self.store, self.meta, report, counts)
            .await?;
        self.store.commit().await?;

        info!(
            schema = %report.schema,
            table = %report.table,
            inserted,
            "report refreshed"
        );

        Ok(counts)
    }

    /// Closes the run: stamps the end timestamp on its audit rows.
    pub async fn finish(self) -> WharfResult<()> {
        self.audit.end_run(self.store, self.meta).await?;
        self.store.commit().await?;

        info!(run_id = self.audit.run_id(), "pipeline finished");

        Ok(())
    }
}
