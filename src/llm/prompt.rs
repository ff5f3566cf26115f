//! Prompt construction for LLM requests.
//!
//! Builds the single-string prompt sent to the model: the schema, the user's
//! question and, on retries, the statement that failed and the database error.

use crate::session::RetryContext;

/// Builds prompts for one SQL dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    dialect: String,
}

impl PromptBuilder {
    /// Creates a builder for the given dialect name (e.g. "MySQL").
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
        }
    }

    /// Returns the dialect name used in prompts.
    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Builds the prompt for one attempt.
    ///
    /// `retry` is `None` on the first attempt. Schema and error text are
    /// inserted verbatim.
    pub fn build(&self, schema: &str, question: &str, retry: Option<&RetryContext>) -> String {
        match retry {
            None => self.first_attempt(schema, question),
            Some(context) => self.retry_attempt(schema, question, context),
        }
    }

    fn first_attempt(&self, schema: &str, question: &str) -> String {
        let dialect = &self.dialect;
        format!(
            "Given this {dialect} database schema:\n\
             \n\
             {schema}\n\
             \n\
             Convert this natural language question to a single SQL SELECT statement:\n\
             \"{question}\"\n\
             \n\
             {requirements}\n\
             \n\
             SQL:",
            requirements = self.requirements("Return only the SQL statement, nothing else"),
        )
    }

    fn retry_attempt(&self, schema: &str, question: &str, context: &RetryContext) -> String {
        let dialect = &self.dialect;
        format!(
            "Given this {dialect} database schema:\n\
             \n\
             {schema}\n\
             \n\
             I tried to convert this natural language question to SQL:\n\
             \"{question}\"\n\
             \n\
             The previous SQL query was:\n\
             {previous_sql}\n\
             \n\
             It failed with this {dialect} error:\n\
             {error}\n\
             \n\
             Fix the SQL query so that it no longer fails.\n\
             \n\
             {requirements}\n\
             \n\
             Corrected SQL:",
            previous_sql = context.sql(),
            error = context.error(),
            requirements =
                self.requirements("Return only the corrected SQL statement, nothing else"),
        )
    }

    fn requirements(&self, first: &str) -> String {
        format!(
            "Requirements:\n\
             - {first}\n\
             - Use {} syntax\n\
             - Only generate read queries (SELECT statements)\n\
             - Do not include any explanations or markdown",
            self.dialect
        )
    }
}
