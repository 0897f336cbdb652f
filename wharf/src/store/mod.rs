//! The target-store seam between the loader and its databases.
//!
//! The merge engine and metadata components speak to the warehouse (and to source
//! databases) exclusively through [`TargetStore`]. The production implementation is
//! [`postgres::PostgresStore`]; tests use the recording store from
//! [`crate::test_utils`].

pub mod postgres;

use async_trait::async_trait;

use crate::error::WharfResult;
use crate::types::{Cell, TableRow};

/// Result of a read query: column names plus rows in result order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryOutput {
    /// Result column names in select-list order.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<TableRow>,
}

/// Store collaborator contract consumed by the loader core.
///
/// Transaction control is explicit and owned by the orchestrator; the merge engine
/// issues statements but never commits. A statement failure is surfaced as
/// [`crate::error::ErrorKind::QueryExecutionFailed`] and never retried.
#[async_trait]
pub trait TargetStore {
    /// Runs a read query, returning the full result set.
    async fn query(&self, sql: &str, params: &[Cell]) -> WharfResult<QueryOutput>;

    /// Executes one write statement, returning the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Cell]) -> WharfResult<u64>;

    /// Executes a parameterized write once per row, returning total affected rows.
    ///
    /// The statement is prepared once; `rows` supplies one parameter set per
    /// execution. Despite the name this also backs batched `UPDATE` passes.
    async fn insert(&self, sql: &str, rows: &[Vec<Cell>]) -> WharfResult<u64>;

    /// Commits the current transactional unit.
    async fn commit(&self) -> WharfResult<()>;

    /// Rolls back the current transactional unit.
    async fn rollback(&self) -> WharfResult<()>;
}
