//! Tracing initialization for wharf services.

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// Errors raised while installing the global tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Initializes the global tracing subscriber for a service binary.
///
/// The filter is taken from `RUST_LOG` when set, otherwise everything from this
/// workspace logs at `info`. Output goes to stderr so data written to stdout by
/// operators stays clean.
pub fn init_tracing(service_name: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish()
        .try_init()?;

    tracing::info!(service = service_name, "tracing initialized");

    Ok(())
}
