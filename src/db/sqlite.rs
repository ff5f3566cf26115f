//! SQLite database client implementation.
//!
//! Useful for local files and for exercising the full pipeline in tests
//! against an in-memory database.

use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::db::{
    push_table_definition, ColumnInfo, DatabaseBackend, DatabaseClient, QueryResult, Row, Value,
    QUERY_TIMEOUT_SECS, SCHEMA_HEADER,
};
use crate::error::{AskError, Result};
use crate::safety::ensure_single_statement;

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Opens the database file (or an in-memory database).
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let options = SqliteConnectOptions::from_str(&conn_str)
            .map_err(|e| AskError::config(format!("Invalid SQLite path: {e}")))?;

        // An in-memory database exists per connection, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                AskError::connection(format!(
                    "Cannot open {}: {e}",
                    config.database.as_deref().unwrap_or("database")
                ))
            })?;

        debug!("Opened {}", config.display_string());
        Ok(Self { pool })
    }

    /// Opens a fresh in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&ConnectionConfig::from_connection_string("sqlite::memory:")?).await
    }

    /// Prepares the statement for its column list, then runs it.
    async fn run_statement(
        &self,
        sql: &str,
    ) -> std::result::Result<(Vec<ColumnInfo>, Vec<SqliteRow>), sqlx::Error> {
        let statement = Executor::prepare(&self.pool, sql).await?;
        let columns = statement
            .columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect();

        let rows = sqlx::raw_sql(sql).fetch_all(&self.pool).await?;
        Ok((columns, rows))
    }

    /// Runs setup statements (e.g. `CREATE TABLE` / `INSERT` seed data).
    pub async fn seed(&self, sql: &str) -> Result<()> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| AskError::query(format_query_error(e)))?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn describe_schema(&self) -> Result<String> {
        let tables: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT name, sql FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AskError::query(format!("Failed to fetch tables: {e}")))?;

        let mut schema = String::from(SCHEMA_HEADER);
        for (name, definition) in tables {
            if let Some(definition) = definition {
                push_table_definition(&mut schema, &name, &definition);
            }
        }

        Ok(schema)
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        ensure_single_statement(sql, DatabaseBackend::Sqlite)?;
        let start = Instant::now();

        let (columns, rows) = tokio::time::timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECS),
            self.run_statement(sql),
        )
        .await
        .map_err(|_| {
            AskError::query(format!(
                "Query timed out after {QUERY_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| AskError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();
        let rows: Vec<Row> = rows.iter().map(convert_row).collect();

        Ok(QueryResult::capped(columns, rows, execution_time))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Converts one value using its storage class, which SQLite tracks per value.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let Ok(raw) = row.try_get_raw(index) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }

    let storage_class = raw.type_info().name().to_string();
    let value = match storage_class.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index).ok().map(Value::Int),
        "REAL" => row.try_get_unchecked::<f64, _>(index).ok().map(Value::Float),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .ok()
            .map(Value::Bytes),
        _ => row
            .try_get_unchecked::<String, _>(index)
            .ok()
            .map(Value::String),
    };

    value.unwrap_or(Value::Null)
}

/// Returns the database diagnostic text, or the driver error otherwise.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
