//! Pipeline tests against a live MySQL server.
//!
//! Skipped unless DATABASE_URL is a mysql:// URL.

use askdb::config::ConnectionConfig;
use askdb::db::{self, DatabaseBackend, DatabaseClient};
use askdb::error::AskError;
use askdb::llm::MockLlmClient;
use askdb::session::{Orchestrator, SessionOutcome, SilentReporter};

use super::common::ScriptedConfirmer;

async fn get_test_client() -> Option<Box<dyn DatabaseClient>> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    if config.backend != DatabaseBackend::MySql {
        return None;
    }
    db::connect(&config).await.ok()
}

#[tokio::test]
async fn test_server_error_drives_retry() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set to a MySQL server");
        return;
    };

    let llm = MockLlmClient::new()
        .with_response("SELEC 1 AS answer")
        .with_response("SELECT 1 AS answer");
    let orchestrator = Orchestrator::new(client, Box::new(llm), 2).unwrap();

    let outcome = orchestrator
        .process(
            "what is one?",
            &ScriptedConfirmer::answering(&[true]),
            &SilentReporter,
        )
        .await
        .unwrap();

    assert!(matches!(outcome, SessionOutcome::Succeeded { attempts: 2, .. }));
    orchestrator.close().await.unwrap();
}

#[tokio::test]
async fn test_exhaustion_carries_server_message() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set to a MySQL server");
        return;
    };

    let llm = MockLlmClient::new().with_response("SELECT * FROM askdb_missing_table_xyz");
    let orchestrator = Orchestrator::new(client, Box::new(llm), 1).unwrap();

    let err = orchestrator
        .process(
            "anything",
            &ScriptedConfirmer::answering(&[true]),
            &SilentReporter,
        )
        .await
        .unwrap_err();

    let AskError::Exhausted { last_error, .. } = &err else {
        panic!("expected exhaustion, got {err:?}");
    };
    assert!(last_error.contains("askdb_missing_table_xyz"));
    orchestrator.close().await.unwrap();
}
