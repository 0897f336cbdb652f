use chrono::NaiveDateTime;

use crate::types::Cell;

/// A complete row of data in table column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    values: Vec<Cell>,
}

impl TableRow {
    /// Creates a new table row with the given cell values.
    ///
    /// The values must be ordered to match the owning table's column list.
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Returns the row values in table column order.
    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Consumes the row and returns its values in table column order.
    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }
}

/// A row bound for the staging area, carrying its change timestamp.
///
/// File extracts stamp every row with the file's batch date; database extracts keep
/// the row's source modification time. The staging loader writes `create_dt` from
/// this timestamp, and the watermark is advanced from its maximum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRow {
    /// Business column values in source column order.
    pub values: Vec<Cell>,
    /// Change timestamp recorded as the staging row's `create_dt`.
    pub create_dt: NaiveDateTime,
}

impl StagedRow {
    /// Creates a staged row from values and a change timestamp.
    pub fn new(values: Vec<Cell>, create_dt: NaiveDateTime) -> Self {
        Self { values, create_dt }
    }
}
