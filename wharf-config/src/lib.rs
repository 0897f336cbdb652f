//! Configuration loading and shared configuration types for the wharf loader.
//!
//! Configuration is assembled from a `configuration/` directory (a `base` file plus an
//! environment overlay) merged with `APP_`-prefixed environment variable overrides.

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config};
pub use secret::SerializableSecretString;
