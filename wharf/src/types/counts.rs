use std::fmt;

/// Row counts produced by one staging load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    /// Rows removed when clearing the staging table.
    pub deleted: u64,
    /// Rows inserted into the staging table.
    pub inserted: u64,
}

/// Row counts produced by one merge of staging into the warehouse.
///
/// The triple is only meaningful when the merge returned without error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    /// Keys logically deleted (historize mode tombstones).
    pub deleted: u64,
    /// Keys rewritten (in-place updates or closed-and-reopened versions).
    pub updated: u64,
    /// New rows inserted.
    pub inserted: u64,
}

impl From<StageCounts> for MergeCounts {
    fn from(counts: StageCounts) -> Self {
        Self {
            deleted: counts.deleted,
            updated: 0,
            inserted: counts.inserted,
        }
    }
}

impl fmt::Display for MergeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deleted={} updated={} inserted={}",
            self.deleted, self.updated, self.inserted
        )
    }
}
