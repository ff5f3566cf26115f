//! The generate / confirm / execute retry loop.

use tracing::{info, warn};

use super::{Confirmer, QuerySession, SessionOutcome, SessionReporter, SessionState};
use crate::db::DatabaseClient;
use crate::error::{AskError, Result};
use crate::llm::{clean_sql_response, LlmClient, PromptBuilder};
use crate::safety::classify_sql;

/// Owns the database and model clients and answers questions one at a time.
pub struct Orchestrator {
    db: Box<dyn DatabaseClient>,
    llm: Box<dyn LlmClient>,
    prompt: PromptBuilder,
    max_attempts: u32,
}

impl Orchestrator {
    /// Creates an orchestrator. Prompts use the database's dialect.
    pub fn new(
        db: Box<dyn DatabaseClient>,
        llm: Box<dyn LlmClient>,
        max_attempts: u32,
    ) -> Result<Self> {
        if max_attempts == 0 {
            return Err(AskError::config("max_attempts must be at least 1"));
        }

        let prompt = PromptBuilder::new(db.backend().dialect_name());
        Ok(Self {
            db,
            llm,
            prompt,
            max_attempts,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn database(&self) -> &dyn DatabaseClient {
        self.db.as_ref()
    }

    /// Answers one question.
    ///
    /// Returns `Declined` when the user turns a candidate down, which is not
    /// an error. Model-client failures end the session at once; execution
    /// failures are fed back to the model until the attempt budget is spent.
    pub async fn process(
        &self,
        question: &str,
        confirmer: &dyn Confirmer,
        reporter: &dyn SessionReporter,
    ) -> Result<SessionOutcome> {
        let schema = self.db.describe_schema().await?;
        let mut session = QuerySession::new(question, schema, self.max_attempts);
        info!(
            "Processing question ({} attempts max): {}",
            self.max_attempts, question
        );

        while session.has_attempts_left() {
            session.begin_attempt();
            let attempt = session.attempt();
            reporter.attempt_started(attempt, self.max_attempts);

            let prompt = self.prompt.build(
                session.schema(),
                session.question(),
                session.retry_context(),
            );

            let raw = match self.llm.generate(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    session.transition(SessionState::FatalGenerationError);
                    return Err(AskError::generation(attempt, &e));
                }
            };

            let sql = clean_sql_response(&raw);
            session.record_candidate(sql.clone());
            reporter.sql_generated(attempt, &sql, classify_sql(&sql));

            if session.needs_confirmation() {
                session.transition(SessionState::AwaitingConfirmation);
                if !confirmer.confirm(&sql).await? {
                    session.transition(SessionState::Declined);
                    info!("User declined query on attempt {}", attempt);
                    reporter.declined();
                    return Ok(SessionOutcome::Declined { attempt });
                }
            } else {
                reporter.auto_executing(&sql);
            }

            session.transition(SessionState::Executing);
            match self.db.execute_query(&sql).await {
                Ok(result) => {
                    session.transition(SessionState::Succeeded);
                    info!(
                        "Query succeeded on attempt {} ({} rows)",
                        attempt, result.row_count
                    );
                    reporter.results(&result);
                    return Ok(SessionOutcome::Succeeded {
                        attempts: attempt,
                        result,
                    });
                }
                Err(e) => {
                    let detail = e.detail();
                    warn!("Attempt {} failed: {}", attempt, detail);
                    reporter.query_failed(attempt, &detail);
                    session.record_failure(detail);
                    if session.has_attempts_left() {
                        reporter.retrying(attempt + 1, self.max_attempts);
                    }
                }
            }
        }

        session.transition(SessionState::ExhaustedFailure);
        Err(AskError::exhausted(self.max_attempts, session.last_error()))
    }

    /// Closes the database connection.
    pub async fn close(&self) -> Result<()> {
        self.db.close().await
    }
}
