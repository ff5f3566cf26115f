//! MySQL database client implementation.
//!
//! Provides the `MySqlClient` struct that implements the `DatabaseClient` trait
//! for MySQL and MariaDB servers using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{
    is_transient_error, push_table_definition, ColumnInfo, DatabaseBackend, DatabaseClient,
    QueryResult, Row, Value, QUERY_TIMEOUT_SECS, SCHEMA_HEADER,
};
use crate::error::{AskError, Result};
use crate::safety::ensure_single_statement;
use async_trait::async_trait;
use sqlx::mysql::{MySqlColumn, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

const ER_UNSUPPORTED_PS: u16 = 1295;

/// MySQL database client.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    /// Connects to the server, retrying transient failures with backoff.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = MySqlPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Connected to {}", config.display_string());
                    return Ok(Self { pool });
                }
                Err(e) if attempt < MAX_RETRY_ATTEMPTS && is_transient_error(&e) => {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(map_connection_error(e, config)),
            }
        }
    }

    /// Prepares the statement, then runs it over the text protocol.
    ///
    /// The server refuses to prepare stacked statements, and the prepared
    /// metadata names the columns even when no row comes back. Statements
    /// the server cannot prepare run as-is and take their columns from the
    /// first row.
    async fn run_statement(
        &self,
        sql: &str,
    ) -> std::result::Result<(Vec<ColumnInfo>, Vec<MySqlRow>), sqlx::Error> {
        let described = match Executor::prepare(&self.pool, sql).await {
            Ok(statement) => Some(column_infos(statement.columns())),
            Err(e) if is_unpreparable(&e) => {
                debug!("Statement cannot be prepared, running unprepared");
                None
            }
            Err(e) => return Err(e),
        };

        // Text protocol: every column arrives as text that can be displayed as-is.
        let rows = sqlx::raw_sql(sql).fetch_all(&self.pool).await?;

        let columns = described
            .or_else(|| rows.first().map(|row| column_infos(row.columns())))
            .unwrap_or_default();
        Ok((columns, rows))
    }

    /// Lists table names in the current database.
    async fn fetch_table_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::raw_sql("SHOW TABLES")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AskError::query(format!("Failed to fetch tables: {e}")))?;

        Ok(rows.iter().filter_map(|row| text_at(row, 0)).collect())
    }

    /// Returns the `SHOW CREATE TABLE` definition, or None if it can't be read.
    async fn fetch_create_statement(&self, table: &str) -> Option<String> {
        let sql = format!("SHOW CREATE TABLE `{}`", table.replace('`', "``"));
        match sqlx::raw_sql(&sql).fetch_one(&self.pool).await {
            // Columns are (Table, Create Table)
            Ok(row) => text_at(&row, 1),
            Err(e) => {
                warn!("Skipping table {table}: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySql
    }

    async fn describe_schema(&self) -> Result<String> {
        let mut schema = String::from(SCHEMA_HEADER);

        for table in self.fetch_table_names().await? {
            if let Some(definition) = self.fetch_create_statement(&table).await {
                push_table_definition(&mut schema, &table, &definition);
            }
        }

        Ok(schema)
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        ensure_single_statement(sql, DatabaseBackend::MySql)?;
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

fn column_infos(columns: &[MySqlColumn]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// ER_UNSUPPORTED_PS: the statement has no prepared form.
fn is_unpreparable(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|e| e.try_downcast_ref::<MySqlDatabaseError>())
        .is_some_and(|e| e.number() == ER_UNSUPPORTED_PS)
}

/// Reads a column as text, accepting binary-collated strings.
fn text_at(row: &MySqlRow, index: usize) -> Option<String> {
    row.try_get_unchecked::<String, _>(index).ok().or_else(|| {
        row.try_get_unchecked::<Vec<u8>, _>(index)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    })
}

/// Converts a sqlx MySqlRow to our Row type.
fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value, falling back to text when a typed decode fails.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Err(_) => return Value::Null,
        Ok(_) => {}
    }

    let upper = type_name.to_uppercase();
    let typed = match upper.as_str() {
        "BOOLEAN" => row.try_get_unchecked::<bool, _>(index).ok().map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR"
        | "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row.try_get_unchecked::<i64, _>(index).ok().map(Value::Int),
        "FLOAT" | "DOUBLE" => row.try_get_unchecked::<f64, _>(index).ok().map(Value::Float),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT"
        | "GEOMETRY" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .ok()
            .map(Value::Bytes),
        _ => None,
    };

    typed
        .or_else(|| text_at(row, index).map(Value::String))
        .unwrap_or(Value::Null)
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> AskError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        AskError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        AskError::connection(format!(
            "Access denied for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("unknown database") {
        AskError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        AskError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        AskError::connection(error.to_string())
    }
}

/// Formats a query error the way the mysql client prints it.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    match db_error.try_downcast_ref::<MySqlDatabaseError>() {
        Some(mysql_error) => match mysql_error.code() {
            Some(state) => format!(
                "Error {} ({}): {}",
                mysql_error.number(),
                state,
                mysql_error.message()
            ),
            None => format!("Error {}: {}", mysql_error.number(), mysql_error.message()),
        },
        None => db_error.message().to_string(),
    }
}
