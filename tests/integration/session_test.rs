//! Retry loop tests against scripted database and model clients.

use std::sync::Arc;

use askdb::db::{ColumnInfo, MockDatabaseClient, QueryResult, Value};
use askdb::error::AskError;
use askdb::llm::{FailingLlmClient, MockLlmClient};
use askdb::session::{Orchestrator, SessionOutcome, SilentReporter};
use pretty_assertions::assert_eq;

use super::common::{RecordingReporter, ScriptedConfirmer};

fn users() -> QueryResult {
    QueryResult::with_data(
        vec![ColumnInfo::new("id", "INT"), ColumnInfo::new("email", "VARCHAR")],
        vec![vec![
            Value::Int(1),
            Value::String("alice@example.com".to_string()),
        ]],
    )
}

#[tokio::test]
async fn test_fenced_typo_is_corrected_on_retry() {
    let db = Arc::new(
        MockDatabaseClient::new()
            .with_error("syntax error near SELEC")
            .with_result(users()),
    );
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("```sql\nSELEC * FROM users\n```")
            .with_response("SELECT * FROM users"),
    );
    let orchestrator =
        Orchestrator::new(Box::new(Arc::clone(&db)), Box::new(Arc::clone(&llm)), 2).unwrap();
    let confirmer = ScriptedConfirmer::answering(&[true]);
    let reporter = RecordingReporter::default();

    let outcome = orchestrator
        .process("list users", &confirmer, &reporter)
        .await
        .unwrap();

    assert_eq!(outcome.attempts(), 2);
    assert!(matches!(outcome, SessionOutcome::Succeeded { .. }));
    assert_eq!(confirmer.asked(), vec!["SELEC * FROM users".to_string()]);

    let retry_prompt = &llm.prompts()[1];
    assert!(retry_prompt.contains("SELEC * FROM users"));
    assert!(retry_prompt.contains("syntax error near SELEC"));
    assert!(retry_prompt.contains("\"list users\""));

    assert_eq!(
        reporter.events(),
        vec![
            "attempt 1/2",
            "sql [unverified] SELEC * FROM users",
            "failed 1: syntax error near SELEC",
            "retry 2",
            "attempt 2/2",
            "sql [read-only] SELECT * FROM users",
            "auto",
            "results 1",
        ]
    );
}

#[tokio::test]
async fn test_unreachable_model_ends_session_without_execution() {
    let db = Arc::new(MockDatabaseClient::new());
    let orchestrator =
        Orchestrator::new(Box::new(Arc::clone(&db)), Box::new(FailingLlmClient), 1).unwrap();

    let err = orchestrator
        .process("list users", &ScriptedConfirmer::answering(&[true]), &SilentReporter)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Generation Error");
    assert!(err.to_string().contains("attempt 1"));
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_declined_first_attempt_is_not_an_error() {
    let db = Arc::new(MockDatabaseClient::new());
    let orchestrator = Orchestrator::new(
        Box::new(Arc::clone(&db)),
        Box::new(MockLlmClient::new().with_response("DROP TABLE users")),
        5,
    )
    .unwrap();

    let outcome = orchestrator
        .process("clean up", &ScriptedConfirmer::default(), &SilentReporter)
        .await
        .unwrap();

    assert_eq!(outcome, SessionOutcome::Declined { attempt: 1 });
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_every_attempt_failing_exhausts_budget() {
    let db = Arc::new(
        MockDatabaseClient::new()
            .with_error("Unknown column 'a'")
            .with_error("Unknown column 'b'"),
    );
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("SELECT a FROM t")
            .with_response("SELECT b FROM t"),
    );
    let orchestrator =
        Orchestrator::new(Box::new(Arc::clone(&db)), Box::new(Arc::clone(&llm)), 2).unwrap();

    let err = orchestrator
        .process("q", &ScriptedConfirmer::answering(&[true]), &SilentReporter)
        .await
        .unwrap_err();

    assert!(matches!(err, AskError::Exhausted { attempts: 2, .. }));
    assert_eq!(
        err.to_string(),
        "Failed to generate working SQL after 2 attempts. Last error: Unknown column 'b'"
    );
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_orchestrator_is_reused_across_questions() {
    let db = Arc::new(MockDatabaseClient::new());
    let llm = Arc::new(
        MockLlmClient::new()
            .with_response("SELECT 1")
            .with_response("SELECT 2"),
    );
    let orchestrator =
        Orchestrator::new(Box::new(Arc::clone(&db)), Box::new(Arc::clone(&llm)), 3).unwrap();
    let confirmer = ScriptedConfirmer::answering(&[true, true]);

    for question in ["one", "two"] {
        let outcome = orchestrator
            .process(question, &confirmer, &SilentReporter)
            .await
            .unwrap();
        assert_eq!(outcome.attempts(), 1);
    }

    // Each question starts fresh, so neither prompt is a retry prompt.
    for prompt in llm.prompts() {
        assert!(prompt.ends_with("SQL:"));
        assert!(!prompt.contains("Corrected SQL:"));
    }
    assert_eq!(db.schema_requests(), 2);
    orchestrator.close().await.unwrap();
}
