//! Reconciling staged snapshots into warehouse targets.
//!
//! Split into a pure planner ([`plan`]) that decides which row operations a
//! snapshot implies, and an engine ([`engine`]) that reads target state and
//! applies the plan through a [`crate::store::TargetStore`].

pub mod engine;
pub mod plan;

pub use engine::{DeletionProbe, merge};
pub use plan::{MergePlan, OpenVersion, Tombstone, compute_plan};
