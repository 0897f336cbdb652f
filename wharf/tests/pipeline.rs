//! End-to-end run of the pipeline over a scripted store.

use std::fs;
use std::io::Write;

use chrono::{NaiveDate, NaiveDateTime};
use wharf::pipeline::LoadPipeline;
use wharf::source::FileExtract;
use wharf::store::QueryOutput;
use wharf::test_utils::{Recorded, RecordingStore};
use wharf::types::{Cell, MergeCounts, TableRef, TableRow};
use wharf_config::shared::{MetadataConfig, StagingConfig};

fn ts(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn output(rows: Vec<Vec<Cell>>) -> QueryOutput {
    QueryOutput {
        columns: Vec::new(),
        rows: rows.into_iter().map(TableRow::new).collect(),
    }
}

fn mapping_row() -> Vec<Cell> {
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

fn staging_config() -> StagingConfig {
    StagingConfig {
        schema: "stage".to_owned(),
        prefix: "stg".to_owned(),
    }
}

fn write_extract(name: &str, body: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("wharf-pipeline-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let mut file = fs::File::create(&path).unwrap();
    write!(file, "{body}").unwrap();
    path
}

#[tokio::test]
async fn file_entity_runs_end_to_end() {
    let store = RecordingStore::new();
    // Pipeline start: mappings, watermarks, run id.
    store.script_query(output(vec![mapping_row()]));
    store.script_query(output(vec![vec![
        Cell::String("stage".into()),
        Cell::String("stg_cards".into()),
        Cell::Timestamp(ts(2024, 1, 1)),
    ]]));
    store.script_query(output(vec![vec![Cell::I64(42)]]));
    // Merge reads: staged snapshot, open versions, distinct keys.
    store.script_query(output(vec![
        vec![
            Cell::String("1".into()),
            Cell::String("blocked".into()),
            Cell::Timestamp(ts(2024, 4, 5)),
        ],
        vec![
            Cell::String("2".into()),
            Cell::String("open".into()),
            Cell::Timestamp(ts(2024, 4, 5)),
        ],
    ]));
    store.script_query(output(vec![vec![
        Cell::String("1".into()),
        Cell::String("open".into()),
        Cell::Bool(false),
    ]]));
    store.script_query(output(vec![vec![Cell::String("1".into())]]));
    // Watermark advance affects one row.
    store.script_execute(0);
    store.script_execute(1);

    let path = write_extract("cards_05042024.csv", "card_num;status\n1;blocked\n2;open\n");
    let extract = FileExtract::open(&path).unwrap();

    let meta = MetadataConfig::default();
    let staging = staging_config();
    let pipeline = LoadPipeline::begin(&store, &meta, &staging).await.unwrap();
    assert_eq!(pipeline.run_id(), 42);

    let counts = pipeline.process_file(&extract).await.unwrap().unwrap();
    assert_eq!(
        counts,
        MergeCounts {
            deleted: 0,
            updated: 1,
            inserted: 1
        }
    );

    pipeline.finish().await.unwrap();

    let recorded = store.recorded();
    // Staging load, watermark, and audit commit before the merge starts.
    let first_commit = recorded
        .iter()
        .position(|entry| matches!(entry, Recorded::Commit))
        .unwrap();
    assert!(recorded[..first_commit].iter().any(|entry| matches!(
        entry,
        Recorded::Execute { sql, .. } if sql == "DELETE FROM stage.stg_cards"
    )));
    assert!(recorded[..first_commit].iter().any(|entry| matches!(
        entry,
        Recorded::Execute { sql, .. } if sql.starts_with("UPDATE meta.etl_update")
    )));
    assert!(recorded[first_commit..].iter().any(|entry| matches!(
        entry,
        Recorded::Insert { sql, .. } if sql.starts_with("INSERT INTO core.cards")
    )));
    // Audit rows for the staging load and the merge, then the run end stamp.
    let audit_rows = recorded
        .iter()
        .filter(|entry| matches!(
            entry,
            Recorded::Execute { sql, .. } if sql.starts_with("INSERT INTO meta.etl_run_log")
        ))
        .count();
    assert_eq!(audit_rows, 2);
    assert!(recorded.iter().any(|entry| matches!(
        entry,
        Recorded::Execute { sql, params } if sql.starts_with("UPDATE meta.etl_run_log")
            && params == &vec![Cell::I64(42)]
    )));

    fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[tokio::test]
async fn stale_extract_leaves_the_warehouse_untouched() {
    let store = RecordingStore::new();
    store.script_query(output(vec![mapping_row()]));
    // Watermark is already past the extract's batch date.
    store.script_query(output(vec![vec![
        Cell::String("stage".into()),
        Cell::String("stg_cards".into()),
        Cell::Timestamp(ts(2024, 6, 1)),
    ]]));
    store.script_query(output(vec![vec![Cell::I64(7)]]));
    // Clearing the staging table removes the previous snapshot's rows.
    store.script_execute(3);

    let path = write_extract("cards_01012024.csv", "card_num;status\n1;open\n");
    let extract = FileExtract::open(&path).unwrap();

    let meta = MetadataConfig::default();
    let staging = staging_config();
    let pipeline = LoadPipeline::begin(&store, &meta, &staging).await.unwrap();

    let outcome = pipeline.process_file(&extract).await.unwrap();
    assert_eq!(outcome, None);

    let recorded = store.recorded();
    // The staging table is still cleared and the skip is audited and committed.
    assert!(recorded.iter().any(|entry| matches!(
        entry,
        Recorded::Execute { sql, .. } if sql == "DELETE FROM stage.stg_cards"
    )));
    let audit_rows: Vec<_> = recorded
        .iter()
        .filter_map(|entry| match entry {
            Recorded::Execute { sql, params }
                if sql.starts_with("INSERT INTO meta.etl_run_log") =>
            {
                Some(params.clone())
            }
            _ => None,
        })
        .collect();
    assert_eq!(audit_rows.len(), 1);
    assert!(audit_rows[0].contains(&Cell::I64(3)));
    assert!(audit_rows[0].contains(&Cell::I64(0)));
    assert!(recorded.iter().any(|entry| matches!(entry, Recorded::Commit)));
    // The merge never runs: no staged rows are inserted and nothing touches
    // the warehouse table.
    assert!(
        recorded
            .iter()
            .all(|entry| !matches!(entry, Recorded::Insert { .. }))
    );
    assert!(recorded.iter().all(|entry| !matches!(
        entry,
        Recorded::Query { sql, .. } if sql.contains("core.cards")
    )));

    fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[tokio::test]
async fn unmapped_entity_fails_the_run() {
    let store = RecordingStore::new();
    store.script_query(output(vec![]));
    store.script_query(output(vec![]));
    store.script_query(output(vec![vec![Cell::I64(1)]]));

    let path = write_extract("unknown_01012024.csv", "a;b\n1;2\n");
    let extract = FileExtract::open(&path).unwrap();

    let meta = MetadataConfig::default();
    let staging = staging_config();
    let pipeline = LoadPipeline::begin(&store, &meta, &staging).await.unwrap();

    let err = pipeline.process_file(&extract).await.unwrap_err();
    assert_eq!(err.kind(), wharf::error::ErrorKind::MappingNotFound);

    fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[tokio::test]
async fn database_entity_stages_keys_for_deletion_detection() {
    let target = RecordingStore::new();
    target.script_query(output(vec![mapping_row()]));
    target.script_query(output(vec![]));
    target.script_query(output(vec![vec![Cell::I64(9)]]));
    // Merge reads: staged snapshot, open versions, distinct keys, companion keys.
    target.script_query(output(vec![vec![
        Cell::String("1".into()),
        Cell::String("open".into()),
        Cell::Timestamp(ts(2024, 5, 2)),
    ]]));
    target.script_query(output(vec![]));
    target.script_query(output(vec![]));
    target.script_query(output(vec![vec![Cell::String("1".into())]]));

    let source = RecordingStore::new();
    // Changed rows since the watermark, then the full key set.
    source.script_query(output(vec![vec![
        Cell::String("1".into()),
        Cell::String("open".into()),
        Cell::Timestamp(ts(2024, 5, 2)),
    ]]));
    source.script_query(output(vec![vec![Cell::String("1".into())]]));

    let meta = MetadataConfig::default();
    let staging = staging_config();
    let pipeline = LoadPipeline::begin(&target, &meta, &staging).await.unwrap();

    let counts = pipeline
        .process_database(&source, "info", "cards")
        .await
        .unwrap();
    assert_eq!(
        counts,
        MergeCounts {
            deleted: 0,
            updated: 0,
            inserted: 1
        }
    );

    let recorded = target.recorded();
    assert!(recorded.iter().any(|entry| matches!(
        entry,
        Recorded::Execute { sql, .. } if sql == "DELETE FROM stage.stg_cards_del"
    )));
    assert!(recorded.iter().any(|entry| matches!(
        entry,
        Recorded::Insert { sql, .. } if sql.starts_with("INSERT INTO stage.stg_cards_del")
    )));
    assert!(source.recorded().iter().any(|entry| matches!(
        entry,
        Recorded::Query { sql, .. } if sql.contains("info.cards")
    )));
}

#[tokio::test]
async fn report_refresh_runs_the_script_and_is_audited() {
    let store = RecordingStore::new();
    store.script_query(output(vec![]));
    store.script_query(output(vec![]));
    store.script_query(output(vec![vec![Cell::I64(11)]]));
    // The refresh script affects five rows.
    store.script_execute(5);

    let meta = MetadataConfig::default();
    let staging = staging_config();
    let pipeline = LoadPipeline::begin(&store, &meta, &staging).await.unwrap();

    let script = "INSERT INTO mart.rep_fraud SELECT * FROM core.v_fraud";
    let counts = pipeline
        .process_report(script, &TableRef::new("mart", "rep_fraud"))
        .await
        .unwrap();
    assert_eq!(
        counts,
        MergeCounts {
            deleted: 0,
            updated: 0,
            inserted: 5
        }
    );

    let recorded = store.recorded();
    // Script first, audit row second, then the commit.
    assert!(matches!(
        &recorded[3],
        Recorded::Execute { sql, params } if sql == script && params.is_empty()
    ));
    assert!(matches!(
        &recorded[4],
        Recorded::Execute { sql, params } if sql.starts_with("INSERT INTO meta.etl_run_log")
            && params.contains(&Cell::String("rep_fraud".into()))
            && params.contains(&Cell::I64(5))
    ));
    assert!(matches!(recorded.last(), Some(Recorded::Commit)));
}
