//! Shared configuration types for the wharf loader.

mod connection;
mod loader;

pub use connection::PgConnectionConfig;
pub use loader::{
    FileSourceConfig, LoaderConfig, MetadataConfig, ReportConfig, SourceDatabaseConfig,
    StagingConfig, ValidationError,
};
