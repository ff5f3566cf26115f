//! Error types for askdb.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for askdb operations.
#[derive(Error, Debug)]
pub enum AskError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, unknown columns, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// LLM API errors (service unreachable, malformed payload, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),

    /// The model client failed while generating SQL. Never retried.
    #[error("Failed to generate SQL on attempt {attempt}: {message}")]
    Generation { attempt: u32, message: String },

    /// Every attempt produced SQL that the database rejected.
    #[error("Failed to generate working SQL after {attempts} attempts. Last error: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl AskError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wraps a model-client failure, annotating the attempt it happened on.
    pub fn generation(attempt: u32, source: &AskError) -> Self {
        let message = match source {
            Self::Llm(msg) => msg.clone(),
            other => other.to_string(),
        };
        Self::Generation { attempt, message }
    }

    /// Creates an exhaustion error carrying the last execution failure.
    pub fn exhausted(attempts: u32, last_error: impl Into<String>) -> Self {
        Self::Exhausted {
            attempts,
            last_error: last_error.into(),
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
            Self::Generation { .. } => "Generation Error",
            Self::Exhausted { .. } => "Retries Exhausted",
        }
    }

    /// Returns the bare diagnostic text, without the category prefix.
    ///
    /// Database errors are fed back to the model through this, so it must be
    /// the driver's message verbatim.
    pub fn detail(&self) -> String {
        match self {
            Self::Connection(msg)
            | Self::Query(msg)
            | Self::Llm(msg)
            | Self::Config(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::Generation { message, .. } => message.clone(),
            Self::Exhausted { last_error, .. } => last_error.clone(),
        }
    }
}

/// Result type alias using AskError.
pub type Result<T> = std::result::Result<T, AskError>;
