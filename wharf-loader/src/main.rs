//! Wharf loader binary.
//!
//! Runs one batch load: picks up pending file extracts and configured database
//! entities, stages them, and merges them into the target warehouse under each
//! entity's change-tracking policy.

use crate::config::load_loader_config;
use crate::core::run_loader;
use crate::error::{LoaderError, LoaderResult};

mod config;
mod core;
mod error;

fn main() -> LoaderResult<()> {
    let config = load_loader_config()?;

    wharf_telemetry::init_tracing(env!("CARGO_BIN_NAME")).map_err(LoaderError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_loader(config))
}
