use serde::Deserialize;
use tokio_postgres::Config as PgConnectOptions;

use crate::SerializableSecretString;

/// Static Postgres connection options that ensure sane defaults.
///
/// Applied to every connection so date and float rendering is consistent across
/// Postgres installations.
const DEFAULT_PG_OPTIONS: &str =
    "-c datestyle=ISO -c intervalstyle=postgres -c extra_float_digits=3 -c client_encoding=UTF8";

/// Configuration for connecting to a Postgres database.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PgConnectionConfig {
    /// Hostname or IP address of the Postgres server.
    pub host: String,
    /// Port number on which the Postgres server is listening.
    pub port: u16,
    /// Name of the Postgres database to connect to.
    pub name: String,
    /// Username for authenticating with the Postgres server.
    pub username: String,
    /// Password for the specified user. Sensitive and redacted in debug output.
    pub password: Option<SerializableSecretString>,
}

impl PgConnectionConfig {
    /// Creates connection options for connecting to the server without selecting a database.
    ///
    /// Useful for administrative operations performed before a specific database exists.
    pub fn without_db(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new();
        options
            .host(&self.host)
            .port(self.port)
            .user(&self.username)
            .options(DEFAULT_PG_OPTIONS);

        if let Some(password) = &self.password {
            options.password(password.expose_secret());
        }

        options
    }

    /// Creates connection options for connecting to the configured database.
    pub fn with_db(&self) -> PgConnectOptions {
        let mut options = self.without_db();
        options.dbname(&self.name);
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> PgConnectionConfig {
        PgConnectionConfig {
            host: "localhost".to_owned(),
            port: 5432,
            name: "warehouse".to_owned(),
            username: "loader".to_owned(),
            password: Some("hunter2".to_owned().into()),
        }
    }

    #[test]
    fn with_db_selects_database() {
        let options = sample_config().with_db();
        assert_eq!(options.get_dbname(), Some("warehouse"));
        assert_eq!(options.get_user(), Some("loader"));
        assert_eq!(options.get_ports(), &[5432]);
    }

    #[test]
    fn without_db_leaves_database_unset() {
        let options = sample_config().without_db();
        assert_eq!(options.get_dbname(), None);
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", sample_config());
        assert!(!rendered.contains("hunter2"));
    }
}
