//! Statement boundary check.
//!
//! Candidates reach the database as exactly one statement. The text is
//! tokenized in the backend's dialect so semicolons inside string literals,
//! quoted identifiers and comments are not mistaken for separators.

use sqlparser::dialect::{Dialect, MySqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::db::DatabaseBackend;
use crate::error::{AskError, Result};

/// Diagnostic returned for stacked statements; it is fed back to the model.
pub const MULTIPLE_STATEMENTS: &str = "Only one SQL statement can be executed at a time";

/// Fails unless `sql` holds a single statement.
///
/// A terminating `;` and trailing comments are accepted.
pub fn ensure_single_statement(sql: &str, backend: DatabaseBackend) -> Result<()> {
    let tokens = match backend {
        DatabaseBackend::MySql => tokenize(&MySqlDialect {}, sql)?,
        DatabaseBackend::Sqlite => tokenize(&SQLiteDialect {}, sql)?,
    };

    let mut terminated = false;
    for token in tokens {
        match token {
            Token::Whitespace(_) | Token::EOF => {}
            Token::SemiColon => terminated = true,
            _ if terminated => return Err(AskError::query(MULTIPLE_STATEMENTS)),
            _ => {}
        }
    }

    Ok(())
}

fn tokenize(dialect: &dyn Dialect, sql: &str) -> Result<Vec<Token>> {
    Tokenizer::new(dialect, sql)
        .tokenize()
        .map_err(|e| AskError::query(format!("Could not read statement: {e}")))
}
