use std::error::Error;

use thiserror::Error;
use wharf::error::WharfError;

/// Result type for loader binary operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Error type for the loader binary.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Failure inside the load run itself.
    #[error(transparent)]
    Load(#[from] WharfError),
    /// Configuration could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(#[source] Box<dyn Error + Send + Sync>),
    /// Runtime startup or filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoaderError {
    /// Creates a configuration error from any source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        LoaderError::Config(Box::new(err))
    }
}
