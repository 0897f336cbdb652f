use std::fs;

use tracing::{error, info};
use wharf::pipeline::LoadPipeline;
use wharf::source::{ExtractFinder, FileExtract};
use wharf::store::TargetStore;
use wharf::store::postgres::PostgresStore;
use wharf::types::TableRef;
use wharf_config::shared::LoaderConfig;

use crate::error::LoaderResult;

/// Runs one complete load against the configured warehouse.
///
/// On any failure the open transactional unit is rolled back, so a partially
/// processed entity leaves no trace beyond its already committed stages.
pub async fn run_loader(config: LoaderConfig) -> LoaderResult<()> {
    info!("starting wharf loader");

    let store = PostgresStore::connect(&config.target).await?;

    let outcome = run_pipeline(&store, &config).await;
    if let Err(err) = &outcome {
        error!("load run failed, rolling back: {err}");
        store.rollback().await?;
    }

    outcome
}

async fn run_pipeline(store: &PostgresStore, config: &LoaderConfig) -> LoaderResult<()> {
    let pipeline = LoadPipeline::begin(store, &config.metadata, &config.staging).await?;

    if let Some(files) = &config.files {
        let finder = ExtractFinder::new(files.input_dir.clone(), files.patterns.clone());
        for path in finder.find()? {
            let extract = FileExtract::open(&path)?;
            match pipeline.process_file(&extract).await? {
                Some(counts) => {
                    info!(entity = extract.entity(), %counts, "processed file extract");
                }
                None => {
                    info!(entity = extract.entity(), "extract not newer than watermark");
                }
            }
            extract.finalize()?;
        }
    }

    if let Some(source_config) = &config.source_database {
        let source = PostgresStore::connect(&source_config.connection).await?;
        for entity in &source_config.entities {
            let counts = pipeline
                .process_database(&source, &source_config.schema, entity)
                .await?;
            info!(entity = %entity, %counts, "processed database entity");
        }
    }

    if let Some(report) = &config.report {
        let script = fs::read_to_string(&report.script)?;
        let table = TableRef::new(report.schema.clone(), report.table.clone());
        let counts = pipeline.process_report(&script, &table).await?;
        info!(table = %report.table, %counts, "refreshed report");
    }

    pipeline.finish().await?;

    info!("load run complete");

    Ok(())
}
