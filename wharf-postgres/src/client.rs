use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Error, NoTls, Row, Statement};
use tracing::{debug, error};
use wharf_config::shared::PgConnectionConfig;

/// A connected Postgres session with an always-open transaction.
///
/// The loader commits in stage-sized units, so the session keeps a transaction open
/// at all times: one is begun right after connecting, and [`PgClient::commit`] /
/// [`PgClient::rollback`] close the current transaction and immediately begin the
/// next one. Dropping the client aborts the driver task and discards any
/// uncommitted work.
pub struct PgClient {
    client: Client,
    connection_handle: JoinHandle<()>,
}

impl PgClient {
    /// Connects to the database described by `config` and opens the first transaction.
    pub async fn connect(config: &PgConnectionConfig) -> Result<Self, Error> {
        let options = config.with_db();
        let (client, connection) = options.connect(NoTls).await?;

        // The connection object drives the socket; it must be polled for the
        // client half to make progress.
        let connection_handle = tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!("postgres connection error: {err}");
            }
        });

        client.batch_execute("BEGIN").await?;
        debug!(host = %config.host, database = %config.name, "connected to postgres");

        Ok(Self {
            client,
            connection_handle,
        })
    }

    /// Runs a read query and returns the result column names together with the rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<(Vec<String>, Vec<Row>), Error> {
        let statement = self.client.prepare(sql).await?;
        let columns = statement
            .columns()
            .iter()
            .map(|column| column.name().to_owned())
            .collect();
        let rows = self.client.query(&statement, params).await?;

        Ok((columns, rows))
    }

    /// Executes a single write statement and returns the number of affected rows.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Error> {
        self.client.execute(sql, params).await
    }

    /// Prepares a statement for repeated execution.
    pub async fn prepare(&self, sql: &str) -> Result<Statement, Error> {
        self.client.prepare(sql).await
    }

    /// Executes a previously prepared statement with one parameter set.
    pub async fn execute_prepared(
        &self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Error> {
        self.client.execute(statement, params).await
    }

    /// Commits the current transaction and begins the next one.
    pub async fn commit(&self) -> Result<(), Error> {
        self.client.batch_execute("COMMIT; BEGIN").await
    }

    /// Rolls back the current transaction and begins the next one.
    pub async fn rollback(&self) -> Result<(), Error> {
        self.client.batch_execute("ROLLBACK; BEGIN").await
    }
}

impl Drop for PgClient {
    fn drop(&mut self) {
        self.connection_handle.abort();
    }
}
