//! Full pipeline tests against an in-memory SQLite database.
//!
//! The model is scripted; everything else (schema text, execution, error
//! messages fed back into the prompt) is real.

use std::sync::Arc;

use askdb::config::ConnectionConfig;
use askdb::db::{self, DatabaseBackend, DatabaseClient, SqliteClient, Value};
use askdb::error::AskError;
use askdb::llm::MockLlmClient;
use askdb::render::render_table;
use askdb::safety::MULTIPLE_STATEMENTS;
use askdb::session::{Orchestrator, SessionOutcome, SilentReporter};

use super::common::ScriptedConfirmer;

const SEED: &str = "
    CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL, name TEXT);
    CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL, total REAL);
    INSERT INTO users (id, email, name) VALUES
        (1, 'alice@example.com', 'Alice'),
        (2, 'bob@example.com', 'Bob'),
        (3, 'carol@example.com', NULL);
    INSERT INTO orders (id, user_id, total) VALUES (1, 1, 9.5), (2, 1, 20.0), (3, 2, 4.25);
";

async fn seeded() -> SqliteClient {
    let client = SqliteClient::in_memory().await.unwrap();
    client.seed(SEED).await.unwrap();
    client
}

#[tokio::test]
async fn test_real_error_is_fed_back_to_model() {
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("```sql\nSELECT emal FROM users ORDER BY id\n```")
            .with_response("SELECT email FROM users ORDER BY id"),
    );
    let orchestrator =
        Orchestrator::new(Box::new(seeded().await), Box::new(Arc::clone(&llm)), 3).unwrap();

    let outcome = orchestrator
        .process(
            "what are the user emails?",
            &ScriptedConfirmer::answering(&[true]),
            &SilentReporter,
        )
        .await
        .unwrap();

    let SessionOutcome::Succeeded { attempts, result } = outcome else {
        panic!("expected success");
    };
    assert_eq!(attempts, 2);
    assert_eq!(result.row_count, 3);
    assert_eq!(result.rows[0][0], Value::String("alice@example.com".to_string()));

    let prompts = llm.prompts();
    assert!(prompts[0].contains("Given this SQLite database schema:"));
    assert!(prompts[0].contains("Table: users\nCREATE TABLE users"));
    assert!(prompts[0].contains("Table: orders\nCREATE TABLE orders"));
    assert!(prompts[1].contains("SELECT emal FROM users ORDER BY id"));
    assert!(prompts[1].contains("no such column: emal"));
}

#[tokio::test]
async fn test_aggregate_query_renders() {
    let llm = MockLlmClient::new().with_response(
        "SELECT u.name, COUNT(o.id) AS orders FROM users u \
         LEFT JOIN orders o ON o.user_id = u.id GROUP BY u.id ORDER BY u.id",
    );
    let orchestrator = Orchestrator::new(Box::new(seeded().await), Box::new(llm), 1).unwrap();

    let outcome = orchestrator
        .process(
            "orders per user",
            &ScriptedConfirmer::answering(&[true]),
            &SilentReporter,
        )
        .await
        .unwrap();

    let SessionOutcome::Succeeded { result, .. } = outcome else {
        panic!("expected success");
    };
    let table = render_table(&result);
    assert!(table.contains("│ Alice │ 2      │"));
    assert!(table.contains("│ NULL  │ 0      │"));
}

#[tokio::test]
async fn test_declined_delete_leaves_data_alone() {
    let db = Arc::new(seeded().await);
    let orchestrator = Orchestrator::new(
        Box::new(Arc::clone(&db)),
        Box::new(MockLlmClient::new().with_response("DELETE FROM users")),
        3,
    )
    .unwrap();

    let outcome = orchestrator
        .process(
            "remove all users",
            &ScriptedConfirmer::answering(&[false]),
            &SilentReporter,
        )
        .await
        .unwrap();
    assert_eq!(outcome, SessionOutcome::Declined { attempt: 1 });

    let count = db.execute_query("SELECT COUNT(*) FROM users").await.unwrap();
    assert_eq!(count.rows[0][0], Value::Int(3));
}

#[tokio::test]
async fn test_read_only_retry_with_second_statement_is_refused() {
    let db = Arc::new(seeded().await);
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("SELEC * FROM users")
            .with_response("SELECT 1; DELETE FROM users"),
    );
    let confirmer = ScriptedConfirmer::answering(&[true]);
    let orchestrator =
        Orchestrator::new(Box::new(Arc::clone(&db)), Box::new(Arc::clone(&llm)), 2).unwrap();

    let err = orchestrator
        .process("list users", &confirmer, &SilentReporter)
        .await
        .unwrap_err();

    let AskError::Exhausted { attempts, last_error } = err else {
        panic!("expected exhaustion");
    };
    assert_eq!(attempts, 2);
    assert_eq!(last_error, MULTIPLE_STATEMENTS);
    assert_eq!(confirmer.asked(), vec!["SELEC * FROM users".to_string()]);

    let count = db.execute_query("SELECT COUNT(*) FROM users").await.unwrap();
    assert_eq!(count.rows[0][0], Value::Int(3));
}

#[tokio::test]
async fn test_empty_result_renders_header() {
    let llm = MockLlmClient::new().with_response("SELECT id, email FROM users WHERE id > 100");
    let orchestrator = Orchestrator::new(Box::new(seeded().await), Box::new(llm), 1).unwrap();

    let outcome = orchestrator
        .process(
            "users with a large id",
            &ScriptedConfirmer::answering(&[true]),
            &SilentReporter,
        )
        .await
        .unwrap();

    let SessionOutcome::Succeeded { result, .. } = outcome else {
        panic!("expected success");
    };
    assert_eq!(result.row_count, 0);
    let table = render_table(&result);
    assert!(table.contains("│ id   │ email │"));
    assert!(!table.contains("(empty result)"));
}

#[tokio::test]
async fn test_connect_factory_opens_sqlite() {
    let config = ConnectionConfig::from_connection_string("sqlite::memory:").unwrap();
    let client = db::connect(&config).await.unwrap();

    assert_eq!(client.backend(), DatabaseBackend::Sqlite);
    let schema = client.describe_schema().await.unwrap();
    assert_eq!(schema, "Database Schema:\n\n");
    client.close().await.unwrap();
}
