//! Core data types shared across the loader.

mod cell;
mod counts;
mod mapping;
mod row;

pub use cell::Cell;
pub use counts::{MergeCounts, StageCounts};
pub use mapping::{EntityMapping, TableRef, TrackingMode};
pub use row::{StagedRow, TableRow};

use chrono::{NaiveDate, NaiveDateTime};

/// Open-ended `effective_to` sentinel for historized rows.
pub fn open_end_sentinel() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .expect("static date is valid")
        .and_hms_opt(0, 0, 0)
        .expect("static time is valid")
}

/// Watermark value meaning "never processed".
pub fn never_processed() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .expect("static date is valid")
        .and_hms_opt(0, 0, 0)
        .expect("static time is valid")
}
