//! Database abstraction layer for askdb.
//!
//! Provides a trait-based interface for database operations, allowing
//! different database backends (and test doubles) to be used interchangeably.

mod mock;
mod mysql;
mod sqlite;
mod types;

pub use mock::{FailingDatabaseClient, MockDatabaseClient};
pub use mysql::MySqlClient;
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Maximum rows kept from a single query result.
pub const MAX_ROWS: usize = 1000;

/// Query timeout in seconds.
pub const QUERY_TIMEOUT_SECS: u64 = 30;

/// Header line every backend starts its schema description with.
pub const SCHEMA_HEADER: &str = "Database Schema:\n\n";

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    MySql,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string or URL scheme.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Sqlite => 0,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Returns the SQL dialect name used when prompting the model.
    pub fn dialect_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Sqlite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Creates a database client for the given backend and configuration.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    match config.backend {
        DatabaseBackend::MySql => {
            let client = MySqlClient::connect(config).await?;
            Ok(Box::new(client))
        }
        DatabaseBackend::Sqlite => {
            let client = SqliteClient::connect(config).await?;
            Ok(Box::new(client))
        }
    }
}

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with AskError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Returns the backend, which determines the SQL dialect.
    fn backend(&self) -> DatabaseBackend;

    /// Describes the database schema as text suitable for a prompt.
    async fn describe_schema(&self) -> Result<String>;

    /// Executes a SQL query and returns the results.
    ///
    /// Failures carry the database diagnostic verbatim in `AskError::Query`.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl<T: DatabaseClient + ?Sized> DatabaseClient for Arc<T> {
    fn backend(&self) -> DatabaseBackend {
        (**self).backend()
    }

    async fn describe_schema(&self) -> Result<String> {
        (**self).describe_schema().await
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        (**self).execute_query(sql).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}

/// Appends one table entry in the shared schema layout.
pub(crate) fn push_table_definition(schema: &mut String, table: &str, definition: &str) {
    schema.push_str("Table: ");
    schema.push_str(table);
    schema.push('\n');
    schema.push_str(definition);
    schema.push_str("\n\n");
}

/// Determines if a connection error is transient and worth retrying.
pub(crate) fn is_transient_error(error: &sqlx::Error) -> bool {
    if matches!(error, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) {
        return true;
    }

    let error_str = error.to_string().to_lowercase();

    // Authentication and missing-database errors are never transient
    if error_str.contains("access denied")
        || error_str.contains("authentication failed")
        || error_str.contains("unknown database")
        || error_str.contains("ssl")
        || error_str.contains("tls")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}
