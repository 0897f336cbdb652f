//! Run-level metadata: entity mappings, watermarks, and the run audit log.
//!
//! Everything here lives in the metadata schema of the target warehouse. Mappings
//! and watermarks are read once at run start into [`MappingRepository`]; the
//! [`RunAuditLog`] writes one row per load stage and stamps the run end when the
//! run finishes.

mod repository;
mod run_log;
mod watermark;

pub use repository::MappingRepository;
pub use run_log::RunAuditLog;
pub use watermark::advance_watermark;
