//! Question sessions.
//!
//! A session is the processing of one natural-language question: generate
//! SQL, gate it on confirmation, execute it, and feed failures back to the
//! model until something runs or the attempt budget is spent.

mod orchestrator;

pub use orchestrator::Orchestrator;

use async_trait::async_trait;
use std::fmt;
use tracing::debug;

use crate::db::QueryResult;
use crate::error::Result;
use crate::safety::{classify_sql, SafetyLevel};

/// The failed statement and database error shown to the model on the next
/// attempt. Only the most recent failure is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    sql: String,
    error: String,
}

impl RetryContext {
    pub fn new(sql: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            error: error.into(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn error(&self) -> &str {
        &self.error
    }
}

/// Where a session currently is in its attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Generating,
    AwaitingConfirmation,
    Executing,
    Succeeded,
    Declined,
    ExhaustedFailure,
    FatalGenerationError,
}

impl SessionState {
    /// Returns true for states that end the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Declined | Self::ExhaustedFailure | Self::FatalGenerationError
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generating => "generating",
            Self::AwaitingConfirmation => "awaiting confirmation",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Declined => "declined",
            Self::ExhaustedFailure => "exhausted",
            Self::FatalGenerationError => "generation failed",
        };
        write!(f, "{}", name)
    }
}

/// Returns true if a candidate must be confirmed before it runs.
///
/// The first attempt is always gated. Corrected retries run unattended only
/// when they are lexically read-only.
pub fn requires_confirmation(attempt: u32, sql: &str) -> bool {
    attempt <= 1 || classify_sql(sql).requires_confirmation()
}

/// State of one question as it moves through the attempt loop.
#[derive(Debug)]
pub struct QuerySession {
    question: String,
    schema: String,
    max_attempts: u32,
    attempt: u32,
    last_sql: String,
    last_error: String,
    retry: Option<RetryContext>,
    state: SessionState,
}

impl QuerySession {
    /// Starts a session for `question` against a schema snapshot.
    pub fn new(question: impl Into<String>, schema: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            question: question.into(),
            schema: schema.into(),
            max_attempts,
            attempt: 0,
            last_sql: String::new(),
            last_error: String::new(),
            retry: None,
            state: SessionState::Generating,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Current attempt number, 1-based. Zero before the first attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Most recent execution error, empty until something fails.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn retry_context(&self) -> Option<&RetryContext> {
        self.retry.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true while another attempt fits in the budget.
    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Moves to the next attempt.
    pub fn begin_attempt(&mut self) {
        self.attempt += 1;
        self.transition(SessionState::Generating);
    }

    /// Records the sanitized candidate for the current attempt.
    pub fn record_candidate(&mut self, sql: impl Into<String>) {
        self.last_sql = sql.into();
    }

    /// Returns true if the current candidate has to be confirmed.
    pub fn needs_confirmation(&self) -> bool {
        requires_confirmation(self.attempt, &self.last_sql)
    }

    /// Records an execution failure and replaces the retry context with it.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.last_error = error.into();
        self.retry = Some(RetryContext::new(
            self.last_sql.clone(),
            self.last_error.clone(),
        ));
    }

    pub(crate) fn transition(&mut self, next: SessionState) {
        debug!(
            "Session state: {} -> {} (attempt {}/{})",
            self.state, next, self.attempt, self.max_attempts
        );
        self.state = next;
    }
}

/// Non-error end of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// A candidate ran successfully.
    Succeeded { attempts: u32, result: QueryResult },
    /// The user turned down the candidate of this attempt.
    Declined { attempt: u32 },
}

impl SessionOutcome {
    /// Number of attempts the session used.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } => *attempts,
            Self::Declined { attempt } => *attempt,
        }
    }
}

/// Asks a human whether a statement may run.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Returns true only on an explicit yes.
    async fn confirm(&self, sql: &str) -> Result<bool>;
}

/// Receives progress from the attempt loop.
///
/// Every method defaults to doing nothing.
pub trait SessionReporter: Send + Sync {
    fn attempt_started(&self, _attempt: u32, _max_attempts: u32) {}

    fn sql_generated(&self, _attempt: u32, _sql: &str, _safety: SafetyLevel) {}

    fn auto_executing(&self, _sql: &str) {}

    fn query_failed(&self, _attempt: u32, _error: &str) {}

    fn retrying(&self, _next_attempt: u32, _max_attempts: u32) {}

    fn results(&self, _result: &QueryResult) {}

    fn declined(&self) {}
}

/// Reporter that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl SessionReporter for SilentReporter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_always_needs_confirmation() {
        assert!(requires_confirmation(1, "SELECT * FROM users"));
        assert!(requires_confirmation(1, "DELETE FROM users"));
    }

    #[test]
    fn test_retry_confirmation_follows_classifier() {
        assert!(!requires_confirmation(2, "SELECT * FROM users"));
        assert!(!requires_confirmation(5, "show tables"));
        assert!(requires_confirmation(2, "UPDATE users SET x = 1"));
        assert!(requires_confirmation(3, "SELEC * FROM users"));
        assert!(requires_confirmation(2, "/* c */ select 1"));
    }

    #[test]
    fn test_session_starts_clean() {
        let session = QuerySession::new("list users", "Database Schema:\n\n", 3);
        assert_eq!(session.question(), "list users");
        assert_eq!(session.attempt(), 0);
        assert_eq!(session.last_error(), "");
        assert!(session.retry_context().is_none());
        assert_eq!(session.state(), SessionState::Generating);
        assert!(session.has_attempts_left());
    }

    #[test]
    fn test_retry_context_is_a_single_slot() {
        let mut session = QuerySession::new("q", "s", 5);

        session.begin_attempt();
        session.record_candidate("SELEC 1");
        session.record_failure("error one");

        session.begin_attempt();
        session.record_candidate("SELECT x");
        session.record_failure("error two");

        let context = session.retry_context().unwrap();
        assert_eq!(context.sql(), "SELECT x");
        assert_eq!(context.error(), "error two");
        assert_eq!(session.last_error(), "error two");
        assert_eq!(session.attempt(), 2);
    }

    #[test]
    fn test_attempt_budget() {
        let mut session = QuerySession::new("q", "s", 1);
        session.begin_attempt();
        assert!(!session.has_attempts_left());
        session.record_candidate("SELECT 1");
        assert!(session.needs_confirmation());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Succeeded.is_terminal());
        assert!(SessionState::Declined.is_terminal());
        assert!(SessionState::ExhaustedFailure.is_terminal());
        assert!(SessionState::FatalGenerationError.is_terminal());
        assert!(!SessionState::Generating.is_terminal());
        assert!(!SessionState::AwaitingConfirmation.is_terminal());
        assert!(!SessionState::Executing.is_terminal());
    }

    #[test]
    fn test_outcome_attempts() {
        let outcome = SessionOutcome::Declined { attempt: 2 };
        assert_eq!(outcome.attempts(), 2);
    }
}
