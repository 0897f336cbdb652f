//! Low-level Postgres client for wharf.
//!
//! Wraps tokio-postgres with the connection lifecycle and explicit transaction
//! boundaries the loader relies on. Higher-level statement construction lives in
//! the `wharf` crate; this crate only moves SQL and parameters over the wire.

mod client;

pub use client::PgClient;
pub use tokio_postgres::{Error as PgError, Row as PgRow, Statement as PgStatement};
