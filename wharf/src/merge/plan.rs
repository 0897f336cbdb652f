use std::collections::{HashMap, HashSet};

use crate::types::{Cell, StagedRow, TrackingMode};

/// One open row of the target: the current row (overwrite) or the open version
/// (historize), with its tombstone flag.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenVersion {
    /// Business column values in mapped column order.
    pub values: Vec<Cell>,
    /// Whether this row marks the key as deleted.
    pub deleted: bool,
}

/// A key that disappeared from the source and must be closed with a tombstone.
#[derive(Debug, Clone, PartialEq)]
pub struct Tombstone {
    /// Natural-key values of the vanished key.
    pub key: Vec<Cell>,
    /// Business values of the version being closed, re-inserted on the tombstone.
    pub last_values: Vec<Cell>,
}

/// The row operations one merge must apply, in apply order: tombstones, then
/// rewrites, then inserts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    /// Keys to close with a deletion tombstone.
    pub tombstones: Vec<Tombstone>,
    /// Staged rows whose key exists but whose values changed.
    pub rewrites: Vec<StagedRow>,
    /// Staged rows whose key has never been seen.
    pub inserts: Vec<StagedRow>,
}

impl MergePlan {
    /// True when the merge has nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.tombstones.is_empty() && self.rewrites.is_empty() && self.inserts.is_empty()
    }
}

/// Extracts the natural-key cells of a row.
pub fn key_of(values: &[Cell], key_indices: &[usize]) -> Vec<Cell> {
    key_indices.iter().map(|&index| values[index].clone()).collect()
}

/// Computes the row operations that reconcile the staged snapshot with the target.
///
/// `current` carries the target's open rows; `existing_keys` the key set across
/// all target rows, including closed versions; `candidates` the source's full key
/// set when deletion detection applies. The planner never mutates its inputs, and
/// replanning an already-applied snapshot yields an empty plan.
pub fn compute_plan(
    mode: TrackingMode,
    key_indices: &[usize],
    staged: &[StagedRow],
    current: &[OpenVersion],
    existing_keys: &HashSet<Vec<Cell>>,
    candidates: Option<&HashSet<Vec<Cell>>>,
) -> MergePlan {
    let mut plan = MergePlan::default();

    let open_by_key: HashMap<Vec<Cell>, &OpenVersion> = current
        .iter()
        .map(|version| (key_of(&version.values, key_indices), version))
        .collect();

    if mode == TrackingMode::Historize {
        if let Some(candidates) = candidates {
            for version in current {
                let key = key_of(&version.values, key_indices);
                if !version.deleted && !candidates.contains(&key) {
                    plan.tombstones.push(Tombstone {
                        key,
                        last_values: version.values.clone(),
                    });
                }
            }
        }
    }

    for row in staged {
        let key = key_of(&row.values, key_indices);
        match mode {
            TrackingMode::Append => {
                if !existing_keys.contains(&key) {
                    plan.inserts.push(row.clone());
                }
            }
            TrackingMode::Overwrite | TrackingMode::Historize => {
                match open_by_key.get(&key) {
                    Some(open) => {
                        // A deleted open version always differs from a staged
                        // row, reviving the key.
                        if open.deleted || open.values != row.values {
                            plan.rewrites.push(row.clone());
                        }
                    }
                    None => {
                        if !existing_keys.contains(&key) {
                            plan.inserts.push(row.clone());
                        }
                    }
                }
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn staged(card: &str, status: &str) -> StagedRow {
        StagedRow::new(
            vec![Cell::String(card.into()), Cell::String(status.into())],
            ts(10),
        )
    }

    fn open(card: &str, status: &str, deleted: bool) -> OpenVersion {
        OpenVersion {
            values: vec![Cell::String(card.into()), Cell::String(status.into())],
            deleted,
        }
    }

    fn keys(cards: &[&str]) -> HashSet<Vec<Cell>> {
        cards
            .iter()
            .map(|card| vec![Cell::String((*card).into())])
            .collect()
    }

    #[test]
    fn new_key_is_inserted() {
        let plan = compute_plan(
            TrackingMode::Historize,
            &[0],
            &[staged("1", "open")],
            &[],
            &HashSet::new(),
            Some(&keys(&["1"])),
        );

        assert!(plan.tombstones.is_empty());
        assert!(plan.rewrites.is_empty());
        assert_eq!(plan.inserts, vec![staged("1", "open")]);
    }

    #[test]
    fn changed_value_is_rewritten() {
        let plan = compute_plan(
            TrackingMode::Historize,
            &[0],
            &[staged("1", "blocked")],
            &[open("1", "open", false)],
            &keys(&["1"]),
            Some(&keys(&["1"])),
        );

        assert_eq!(plan.rewrites, vec![staged("1", "blocked")]);
        assert!(plan.inserts.is_empty());
        assert!(plan.tombstones.is_empty());
    }

    #[test]
    fn vanished_key_is_tombstoned() {
        let plan = compute_plan(
            TrackingMode::Historize,
            &[0],
            &[],
            &[open("1", "open", false)],
            &keys(&["1"]),
            Some(&HashSet::new()),
        );

        assert_eq!(plan.tombstones.len(), 1);
        assert_eq!(plan.tombstones[0].key, vec![Cell::String("1".into())]);
        assert!(plan.rewrites.is_empty());
    }

    #[test]
    fn unchanged_snapshot_yields_empty_plan() {
        let plan = compute_plan(
            TrackingMode::Historize,
            &[0],
            &[staged("1", "open")],
            &[open("1", "open", false)],
            &keys(&["1"]),
            Some(&keys(&["1"])),
        );

        assert!(plan.is_empty());
    }

    #[test]
    fn tombstoned_key_is_not_retombstoned() {
        let plan = compute_plan(
            TrackingMode::Historize,
            &[0],
            &[],
            &[open("1", "open", true)],
            &keys(&["1"]),
            Some(&HashSet::new()),
        );

        assert!(plan.is_empty());
    }

    #[test]
    fn reappearing_key_revives_through_a_rewrite() {
        let plan = compute_plan(
            TrackingMode::Historize,
            &[0],
            &[staged("1", "open")],
            &[open("1", "open", true)],
            &keys(&["1"]),
            Some(&keys(&["1"])),
        );

        assert_eq!(plan.rewrites, vec![staged("1", "open")]);
        assert!(plan.inserts.is_empty());
    }

    #[test]
    fn missing_candidates_disable_deletion_detection() {
        let plan = compute_plan(
            TrackingMode::Historize,
            &[0],
            &[],
            &[open("1", "open", false)],
            &keys(&["1"]),
            None,
        );

        assert!(plan.is_empty());
    }

    #[test]
    fn append_only_inserts_unknown_keys() {
        let plan = compute_plan(
            TrackingMode::Append,
            &[0],
            &[staged("1", "blocked"), staged("2", "open")],
            &[],
            &keys(&["1"]),
            None,
        );

        assert_eq!(plan.inserts, vec![staged("2", "open")]);
        assert!(plan.rewrites.is_empty());
    }

    #[test]
    fn overwrite_updates_in_place_and_inserts_new() {
        let plan = compute_plan(
            TrackingMode::Overwrite,
            &[0],
            &[staged("1", "blocked"), staged("2", "open"), staged("3", "open")],
            &[open("1", "open", false), open("3", "open", false)],
            &keys(&["1", "3"]),
            None,
        );

        assert_eq!(plan.rewrites, vec![staged("1", "blocked")]);
        assert_eq!(plan.inserts, vec![staged("2", "open")]);
    }
}
