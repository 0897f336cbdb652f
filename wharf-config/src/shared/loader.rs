use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::load::Config;
use crate::shared::PgConnectionConfig;

/// Errors produced while validating a loaded configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The file source block lists no filename patterns.
    #[error("file source configured without filename patterns")]
    NoFilePatterns,
    /// The source database block lists no entities to extract.
    #[error("source database configured without entities")]
    NoSourceEntities,
    /// The staging table prefix is empty.
    #[error("staging table prefix must not be empty")]
    EmptyStagingPrefix,
}

/// Names of the metadata tables driving the load.
///
/// The defaults match the warehouse-side metadata layout; overriding them allows several
/// loaders to share one database under different metadata schemas.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetadataConfig {
    /// Schema holding all metadata tables and the run sequence.
    #[serde(default = "default_metadata_schema")]
    pub schema: String,
    /// Table mapping source entities to warehouse targets.
    #[serde(default = "default_mapping_table")]
    pub mapping_table: String,
    /// Table holding per-entity high-water marks.
    #[serde(default = "default_watermark_table")]
    pub watermark_table: String,
    /// Table receiving per-run, per-entity audit rows.
    #[serde(default = "default_run_log_table")]
    pub run_log_table: String,
    /// Sequence issuing monotonically increasing run identifiers.
    #[serde(default = "default_run_sequence")]
    pub run_sequence: String,
}

fn default_metadata_schema() -> String {
    "meta".to_owned()
}

fn default_mapping_table() -> String {
    "core_table_mapping".to_owned()
}

fn default_watermark_table() -> String {
    "etl_update".to_owned()
}

fn default_run_log_table() -> String {
    "etl_run_log".to_owned()
}

fn default_run_sequence() -> String {
    "etl_run".to_owned()
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            schema: default_metadata_schema(),
            mapping_table: default_mapping_table(),
            watermark_table: default_watermark_table(),
            run_log_table: default_run_log_table(),
            run_sequence: default_run_sequence(),
        }
    }
}

/// Location of the staging area inside the warehouse.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StagingConfig {
    /// Schema holding the staging tables.
    pub schema: String,
    /// Prefix prepended to every staging table name (`<prefix>_<entity>`).
    #[serde(default = "default_staging_prefix")]
    pub prefix: String,
}

fn default_staging_prefix() -> String {
    "stg".to_owned()
}

/// Configuration for file-based extracts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileSourceConfig {
    /// Directory scanned for extract files.
    pub input_dir: PathBuf,
    /// Filename patterns to pick up, e.g. `transactions_*.txt`.
    pub patterns: Vec<String>,
}

/// Configuration for extracting entities from an external operational database.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceDatabaseConfig {
    /// Connection parameters for the source database.
    pub connection: PgConnectionConfig,
    /// Schema in the source database holding the extracted tables.
    pub schema: String,
    /// Entities (table names) to extract, in processing order.
    pub entities: Vec<String>,
}

/// Configuration for a scripted report refresh run after the entity loads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReportConfig {
    /// SQL script file executed against the warehouse.
    pub script: PathBuf,
    /// Schema of the refreshed report table, as recorded in the run log.
    pub schema: String,
    /// Name of the refreshed report table, as recorded in the run log.
    pub table: String,
}

/// Root configuration for the wharf loader.
///
/// This intentionally does not implement `Serialize` to avoid accidentally leaking
/// connection secrets in serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoaderConfig {
    /// Connection parameters for the target warehouse.
    pub target: PgConnectionConfig,
    /// Metadata table names.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Staging area location.
    pub staging: StagingConfig,
    /// File-based sources, if any.
    pub files: Option<FileSourceConfig>,
    /// Database source, if any.
    pub source_database: Option<SourceDatabaseConfig>,
    /// Report refresh script, if any.
    pub report: Option<ReportConfig>,
}

impl LoaderConfig {
    /// Validates the configuration beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.staging.prefix.is_empty() {
            return Err(ValidationError::EmptyStagingPrefix);
        }

        if let Some(files) = &self.files
            && files.patterns.is_empty()
        {
            return Err(ValidationError::NoFilePatterns);
        }

        if let Some(source) = &self.source_database
            && source.entities.is_empty()
        {
            return Err(ValidationError::NoSourceEntities);
        }

        Ok(())
    }
}

impl Config for LoaderConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] =
        &["files.patterns", "source_database.entities"];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> LoaderConfig {
        LoaderConfig {
            target: PgConnectionConfig {
                host: "localhost".to_owned(),
                port: 5432,
                name: "warehouse".to_owned(),
                username: "loader".to_owned(),
                password: None,
            },
            metadata: MetadataConfig::default(),
            staging: StagingConfig {
                schema: "stage".to_owned(),
                prefix: "stg".to_owned(),
            },
            files: None,
            source_database: None,
            report: None,
        }
    }

    #[test]
    fn minimal_config_is_valid() {
        assert_eq!(minimal_config().validate(), Ok(()));
    }

    #[test]
    fn empty_patterns_are_rejected() {
        let mut config = minimal_config();
        config.files = Some(FileSourceConfig {
            input_dir: PathBuf::from("/data/in"),
            patterns: Vec::new(),
        });
        assert_eq!(config.validate(), Err(ValidationError::NoFilePatterns));
    }

    #[test]
    fn empty_staging_prefix_is_rejected() {
        let mut config = minimal_config();
        config.staging.prefix = String::new();
        assert_eq!(config.validate(), Err(ValidationError::EmptyStagingPrefix));
    }
}
