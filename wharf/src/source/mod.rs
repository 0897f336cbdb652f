//! Extraction from the supported source kinds.
//!
//! File drops are full snapshots named `<entity>_<ddmmyyyy>.<ext>`; database
//! sources deliver changed rows since the entity's watermark plus a full key
//! snapshot for deletion detection.

pub mod database;
pub mod file;
mod finder;

pub use file::FileExtract;
pub use finder::ExtractFinder;
