//! Test doubles and fixtures shared by unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::WharfResult;
use crate::store::{QueryOutput, TargetStore};
use crate::types::{Cell, EntityMapping, TableRef, TrackingMode};

/// One statement observed by a [`RecordingStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// A read query with its bound parameters.
    Query { sql: String, params: Vec<Cell> },
    /// A single write statement with its bound parameters.
    Execute { sql: String, params: Vec<Cell> },
    /// A prepared write with one parameter set per row.
    Insert { sql: String, rows: Vec<Vec<Cell>> },
    /// A transaction commit.
    Commit,
    /// A transaction rollback.
    Rollback,
}

#[derive(Default)]
struct Inner {
    query_results: VecDeque<QueryOutput>,
    execute_results: VecDeque<u64>,
    recorded: Vec<Recorded>,
}

/// Scripted [`TargetStore`] that records every statement it receives.
///
/// Query results and execute counts are consumed in scripting order; an
/// unscripted query yields an empty result set and an unscripted execute
/// affects zero rows. Inserts report one affected row per parameter set.
#[derive(Clone, Default)]
pub struct RecordingStore {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of the next read query.
    pub fn script_query(&self, output: QueryOutput) {
        self.inner.lock().unwrap().query_results.push_back(output);
    }

    /// Queues the affected-row count of the next write statement.
    pub fn script_execute(&self, affected: u64) {
        self.inner.lock().unwrap().execute_results.push_back(affected);
    }

    /// Returns every statement received so far, in order.
    pub fn recorded(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().recorded.clone()
    }

    /// Returns the recorded statements, dropping commits and rollbacks.
    pub fn recorded_statements(&self) -> Vec<Recorded> {
        self.recorded()
            .into_iter()
            .filter(|entry| !matches!(entry, Recorded::Commit | Recorded::Rollback))
            .collect()
    }
}

#[async_trait]
impl TargetStore for RecordingStore {
    async fn query(&self, sql: &str, params: &[Cell]) -> WharfResult<QueryOutput> {
        let mut inner = self.inner.lock().unwrap();
        inner.recorded.push(Recorded::Query {
            sql: sql.to_owned(),
            params: params.to_vec(),
        });
        Ok(inner.query_results.pop_front().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Cell]) -> WharfResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        inner.recorded.push(Recorded::Execute {
            sql: sql.to_owned(),
            params: params.to_vec(),
        });
        Ok(inner.execute_results.pop_front().unwrap_or(0))
    }

    async fn insert(&self, sql: &str, rows: &[Vec<Cell>]) -> WharfResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        inner.recorded.push(Recorded::Insert {
            sql: sql.to_owned(),
            rows: rows.to_vec(),
        });
        Ok(rows.len() as u64)
    }

    async fn commit(&self) -> WharfResult<()> {
        self.inner.lock().unwrap().recorded.push(Recorded::Commit);
        Ok(())
    }

    async fn rollback(&self) -> WharfResult<()> {
        self.inner.lock().unwrap().recorded.push(Recorded::Rollback);
        Ok(())
    }
}

/// A card entity mapped with full historization.
pub fn historized_mapping() -> EntityMapping {
    EntityMapping {
        target: TableRef::new("core", "cards"),
        target_columns: vec!["card_num".into(), "status".into()],
        target_keys: vec!["card_num".into()],
        mode: TrackingMode::Historize,
        source: TableRef::new("stage", "stg_cards"),
        source_columns: vec!["card_num".into(), "status".into()],
        source_keys: vec!["card_num".into()],
    }
}

/// The card entity mapped for in-place overwrite.
pub fn overwrite_mapping() -> EntityMapping {
    EntityMapping {
        mode: TrackingMode::Overwrite,
        ..historized_mapping()
    }
}

/// The card entity mapped for plain append.
pub fn append_mapping() -> EntityMapping {
    EntityMapping {
        mode: TrackingMode::Append,
        ..historized_mapping()
    }
}
