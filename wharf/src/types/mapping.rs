use crate::bail;
use crate::error::{ErrorKind, WharfResult};
use crate::sql;

/// A schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// Schema the table lives in.
    pub schema: String,
    /// Table name without schema.
    pub table: String,
}

impl TableRef {
    /// Creates a table reference from schema and table names.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

/// Change-tracking policy applied when merging an entity into the warehouse.
///
/// Decoded once from the metadata mode column and passed explicitly from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    /// Insert rows whose key is new; never update or delete.
    Append,
    /// Keep one current row per key, overwriting prior values (SCD1).
    Overwrite,
    /// Keep every version per key bounded by effective time, with deletion
    /// tombstones (SCD2).
    Historize,
}

impl TrackingMode {
    /// Decodes the metadata mode column.
    ///
    /// Mode `1` is overwrite and `2` is historization; every other value falls back
    /// to plain append.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => TrackingMode::Overwrite,
            2 => TrackingMode::Historize,
            _ => TrackingMode::Append,
        }
    }
}

/// The mapping of one logical entity between its staged source and warehouse target.
///
/// Key lists are positionally paired: `source_keys[i]` in the staging table
/// corresponds to `target_keys[i]` in the warehouse table. Column lists are paired
/// the same way for value comparison. Mappings are read-only within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMapping {
    /// Warehouse target table.
    pub target: TableRef,
    /// Business columns of the target table.
    pub target_columns: Vec<String>,
    /// Natural-key columns of the target table.
    pub target_keys: Vec<String>,
    /// Change-tracking policy for this entity.
    pub mode: TrackingMode,
    /// Staging table holding the entity's current snapshot.
    pub source: TableRef,
    /// Business columns of the staging table.
    pub source_columns: Vec<String>,
    /// Natural-key columns of the staging table.
    pub source_keys: Vec<String>,
}

impl EntityMapping {
    /// Validates the structural invariants of the mapping.
    ///
    /// Checks identifier syntax on every name, equal key arity between source and
    /// target, equal column arity, and that each key column appears in its column
    /// list.
    pub fn validate(&self) -> WharfResult<()> {
        for name in [
            &self.target.schema,
            &self.target.table,
            &self.source.schema,
            &self.source.table,
        ] {
            sql::validate_ident(name)?;
        }
        for name in self
            .target_columns
            .iter()
            .chain(&self.target_keys)
            .chain(&self.source_columns)
            .chain(&self.source_keys)
        {
            sql::validate_ident(name)?;
        }

        if self.source_keys.len() != self.target_keys.len() {
            bail!(
                ErrorKind::InvalidData,
                "source and target key lists differ in arity",
                format!(
                    "{}.{}: {} source keys vs {} target keys",
                    self.target.schema,
                    self.target.table,
                    self.source_keys.len(),
                    self.target_keys.len()
                )
            );
        }
        if self.source_keys.is_empty() {
            bail!(
                ErrorKind::InvalidData,
                "mapping declares no natural-key columns",
                format!("{}.{}", self.target.schema, self.target.table)
            );
        }
        if self.source_columns.len() != self.target_columns.len() {
            bail!(
                ErrorKind::InvalidData,
                "source and target column lists differ in arity",
                format!(
                    "{}.{}: {} source columns vs {} target columns",
                    self.target.schema,
                    self.target.table,
                    self.source_columns.len(),
                    self.target_columns.len()
                )
            );
        }

        for key in &self.source_keys {
            if !self.source_columns.contains(key) {
                bail!(
                    ErrorKind::InvalidData,
                    "source key column is not in the source column list",
                    key.clone()
                );
            }
        }
        for key in &self.target_keys {
            if !self.target_columns.contains(key) {
                bail!(
                    ErrorKind::InvalidData,
                    "target key column is not in the target column list",
                    key.clone()
                );
            }
        }

        // Key indices derived from the source column list are applied to rows
        // in target column order, so each key pair must sit at the same
        // position in both lists.
        for (source_key, target_key) in self.source_keys.iter().zip(&self.target_keys) {
            let source_pos = self.source_columns.iter().position(|col| col == source_key);
            let target_pos = self.target_columns.iter().position(|col| col == target_key);
            if source_pos != target_pos {
                bail!(
                    ErrorKind::InvalidData,
                    "key columns sit at different positions in the source and target column lists",
                    format!(
                        "{}.{}: {source_key} at {:?} vs {target_key} at {:?}",
                        self.target.schema, self.target.table, source_pos, target_pos
                    )
                );
            }
        }

        Ok(())
    }

    /// Returns positions of the source key columns within the source column list.
    pub fn source_key_indices(&self) -> Vec<usize> {
        self.source_keys
            .iter()
            .filter_map(|key| self.source_columns.iter().position(|col| col == key))
            .collect()
    }

    /// Returns the target columns that are not part of the natural key.
    pub fn target_value_columns(&self) -> Vec<&str> {
        self.target_columns
            .iter()
            .filter(|col| !self.target_keys.contains(col))
            .map(String::as_str)
            .collect()
    }

    /// Returns the source columns positionally paired with [`Self::target_value_columns`].
    pub fn source_value_columns(&self) -> Vec<&str> {
        self.source_columns
            .iter()
            .zip(&self.target_columns)
            .filter(|(_, target)| !self.target_keys.contains(*target))
            .map(|(source, _)| source.as_str())
            .collect()
    }

    /// Returns the companion staging table holding the source's full key set.
    pub fn deletion_staging_table(&self) -> TableRef {
        TableRef::new(
            self.source.schema.clone(),
            format!("{}_del", self.source.table),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> EntityMapping {
        EntityMapping {
            target: TableRef::new("core", "cards"),
            target_columns: vec!["card_num".into(), "account".into(), "status".into()],
            target_keys: vec!["card_num".into()],
            mode: TrackingMode::Historize,
            source: TableRef::new("stage", "stg_cards"),
            source_columns: vec!["card_num".into(), "account".into(), "status".into()],
            source_keys: vec!["card_num".into()],
        }
    }

    #[test]
    fn valid_mapping_passes() {
        assert!(mapping().validate().is_ok());
    }

    #[test]
    fn key_arity_mismatch_is_rejected() {
        let mut m = mapping();
        m.target_keys.push("account".into());
        let err = m.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn key_outside_column_list_is_rejected() {
        let mut m = mapping();
        m.source_keys = vec!["missing".into()];
        m.target_keys = vec!["card_num".into()];
        assert!(m.validate().is_err());
    }

    #[test]
    fn misaligned_key_positions_are_rejected() {
        let mut m = mapping();
        // Same names on both sides, but the key sits at position 0 in the
        // source list and position 2 in the target list.
        m.target_columns = vec!["account".into(), "status".into(), "card_num".into()];
        let err = m.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn invalid_identifier_is_rejected() {
        let mut m = mapping();
        m.target.table = "cards; DROP TABLE".into();
        let err = m.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn mode_codes_decode() {
        assert_eq!(TrackingMode::from_code(1), TrackingMode::Overwrite);
        assert_eq!(TrackingMode::from_code(2), TrackingMode::Historize);
        assert_eq!(TrackingMode::from_code(0), TrackingMode::Append);
        assert_eq!(TrackingMode::from_code(9), TrackingMode::Append);
    }

    #[test]
    fn value_columns_exclude_keys_pairwise() {
        let m = mapping();
        assert_eq!(m.target_value_columns(), vec!["account", "status"]);
        assert_eq!(m.source_value_columns(), vec!["account", "status"]);
        assert_eq!(m.source_key_indices(), vec![0]);
    }

    #[test]
    fn deletion_staging_table_appends_suffix() {
        assert_eq!(
            mapping().deletion_staging_table(),
            TableRef::new("stage", "stg_cards_del")
        );
    }
}
