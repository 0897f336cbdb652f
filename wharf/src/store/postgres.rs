use async_trait::async_trait;
use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};
use wharf_config::shared::PgConnectionConfig;
use wharf_postgres::PgClient;

use crate::error::{ErrorKind, WharfResult};
use crate::store::{QueryOutput, TargetStore};
use crate::types::{Cell, TableRow};
use crate::wharf_error;

/// [`TargetStore`] implementation over a [`PgClient`] session.
pub struct PostgresStore {
    client: PgClient,
}

impl PostgresStore {
    /// Connects to the configured database.
    pub async fn connect(config: &PgConnectionConfig) -> WharfResult<Self> {
        let client = PgClient::connect(config).await.map_err(|err| {
            wharf_error!(
                ErrorKind::ConnectionFailed,
                "failed to connect to postgres",
                format!("{}:{}/{}", config.host, config.port, config.name),
                source: err
            )
        })?;

        Ok(Self { client })
    }
}

fn bind_params(params: &[Cell]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|cell| cell as &(dyn ToSql + Sync)).collect()
}

/// Decodes one result column into a [`Cell`].
///
/// Unsupported column types fail with [`ErrorKind::ConversionError`] naming the
/// Postgres type, instead of silently degrading to text.
fn cell_from_column(row: &Row, index: usize) -> WharfResult<Cell> {
    let column_type = row.columns()[index].type_();

    let cell = if *column_type == Type::BOOL {
        row.try_get::<_, Option<bool>>(index)?.map(Cell::Bool)
    } else if *column_type == Type::INT2 {
        row.try_get::<_, Option<i16>>(index)?.map(Cell::I16)
    } else if *column_type == Type::INT4 {
        row.try_get::<_, Option<i32>>(index)?.map(Cell::I32)
    } else if *column_type == Type::INT8 {
        row.try_get::<_, Option<i64>>(index)?.map(Cell::I64)
    } else if *column_type == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(index)?.map(Cell::F32)
    } else if *column_type == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(index)?.map(Cell::F64)
    } else if *column_type == Type::TEXT
        || *column_type == Type::VARCHAR
        || *column_type == Type::BPCHAR
    {
        row.try_get::<_, Option<String>>(index)?.map(Cell::String)
    } else if *column_type == Type::DATE {
        row.try_get::<_, Option<chrono::NaiveDate>>(index)?.map(Cell::Date)
    } else if *column_type == Type::TIMESTAMP {
        row.try_get::<_, Option<chrono::NaiveDateTime>>(index)?
            .map(Cell::Timestamp)
    } else if *column_type == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(index)?
            .map(|ts| Cell::Timestamp(ts.naive_utc()))
    } else if *column_type == Type::TEXT_ARRAY || *column_type == Type::VARCHAR_ARRAY {
        row.try_get::<_, Option<Vec<String>>>(index)?
            .map(Cell::TextArray)
    } else {
        return Err(wharf_error!(
            ErrorKind::ConversionError,
            "unsupported column type in result set",
            format!(
                "column {} has type {column_type}",
                row.columns()[index].name()
            )
        ));
    };

    Ok(cell.unwrap_or(Cell::Null))
}

fn convert_rows(rows: Vec<Row>) -> WharfResult<Vec<TableRow>> {
    let mut converted = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut values = Vec::with_capacity(row.len());
        for index in 0..row.len() {
            values.push(cell_from_column(row, index)?);
        }
        converted.push(TableRow::new(values));
    }
    Ok(converted)
}

#[async_trait]
impl TargetStore for PostgresStore {
    async fn query(&self, sql: &str, params: &[Cell]) -> WharfResult<QueryOutput> {
        let (columns, rows) = self.client.query(sql, &bind_params(params)).await?;
        Ok(QueryOutput {
            columns,
            rows: convert_rows(rows)?,
        })
    }

    async fn execute(&self, sql: &str, params: &[Cell]) -> WharfResult<u64> {
        Ok(self.client.execute(sql, &bind_params(params)).await?)
    }

    async fn insert(&self, sql: &str, rows: &[Vec<Cell>]) -> WharfResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let statement = self.client.prepare(sql).await?;
        let mut affected = 0;
        for row in rows {
            affected += self
                .client
                .execute_prepared(&statement, &bind_params(row))
                .await?;
        }

        Ok(affected)
    }

    async fn commit(&self) -> WharfResult<()> {
        Ok(self.client.commit().await?)
    }

    async fn rollback(&self) -> WharfResult<()> {
        Ok(self.client.rollback().await?)
    }
}
