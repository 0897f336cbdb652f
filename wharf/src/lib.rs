//! Metadata-driven batch loading into a Postgres warehouse.
//!
//! The crate reconciles staged snapshots of heterogeneous sources (delimited file
//! drops, operational databases) into warehouse tables under per-entity
//! change-tracking policy: append, overwrite in place, or full historization.
//! Which policy applies, and how source columns map onto the target, is read from
//! metadata tables rather than hard-coded per table.

pub mod error;
#[macro_use]
mod macros;
pub mod merge;
pub mod metadata;
pub mod pipeline;
pub mod source;
pub mod sql;
pub mod staging;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
