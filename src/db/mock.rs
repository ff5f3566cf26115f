//! Mock database clients for testing.
//!
//! Provides scripted, in-memory implementations of `DatabaseClient` so the
//! retry loop can be tested without a server.

use super::{ColumnInfo, DatabaseBackend, DatabaseClient, QueryResult, Value, SCHEMA_HEADER};
use crate::error::{AskError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A scripted reply to one `execute_query` call.
#[derive(Debug, Clone)]
enum MockReply {
    Rows(QueryResult),
    Error(String),
}

/// A mock database client that replays scripted results.
///
/// Each `execute_query` call pops the next scripted reply. Once the script
/// runs out, every query succeeds with a single echo row.
#[derive(Debug)]
pub struct MockDatabaseClient {
    backend: DatabaseBackend,
    schema: String,
    replies: Mutex<VecDeque<MockReply>>,
    executed: Mutex<Vec<String>>,
    schema_requests: AtomicUsize,
}

impl MockDatabaseClient {
    /// Creates a new mock client with an empty schema.
    pub fn new() -> Self {
        Self {
            backend: DatabaseBackend::MySql,
            schema: SCHEMA_HEADER.to_string(),
            replies: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
            schema_requests: AtomicUsize::new(0),
        }
    }

    /// Sets the schema text returned by `describe_schema`.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the reported backend (and therefore the SQL dialect).
    pub fn with_backend(mut self, backend: DatabaseBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Queues a successful result.
    pub fn with_result(self, result: QueryResult) -> Self {
        lock(&self.replies).push_back(MockReply::Rows(result));
        self
    }

    /// Queues a failure carrying the given database diagnostic.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        lock(&self.replies).push_back(MockReply::Error(message.into()));
        self
    }

    /// Returns every SQL string passed to `execute_query`, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }

    /// Returns how many times the schema was requested.
    pub fn schema_requests(&self) -> usize {
        self.schema_requests.load(Ordering::SeqCst)
    }

    fn echo_result(sql: &str) -> QueryResult {
        QueryResult::with_data(
            vec![ColumnInfo::new("result", "TEXT")],
            vec![vec![Value::String(format!("Mock result for: {sql}"))]],
        )
        .with_execution_time(Duration::from_millis(1))
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    async fn describe_schema(&self) -> Result<String> {
        self.schema_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        lock(&self.executed).push(sql.to_string());

        match lock(&self.replies).pop_front() {
            Some(MockReply::Rows(result)) => Ok(result),
            Some(MockReply::Error(message)) => Err(AskError::query(message)),
            None => Ok(Self::echo_result(sql)),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A database client whose every operation fails, for error-path tests.
#[derive(Debug, Default)]
pub struct FailingDatabaseClient;

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySql
    }

    async fn describe_schema(&self) -> Result<String> {
        Err(AskError::connection("Lost connection to MySQL server"))
    }

    async fn execute_query(&self, _sql: &str) -> Result<QueryResult> {
        Err(AskError::connection("Lost connection to MySQL server"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Locks a mock's state, recovering it if a panicking test poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
