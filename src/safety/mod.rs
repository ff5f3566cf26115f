//! Query safety classification module.
//!
//! Lexically decides whether generated SQL may run without asking the user.
//! There is no parser here: a statement counts as read-only when its
//! normalized text starts with one of a fixed set of keywords. Anything else
//! is treated as unsafe.
//!
//! `ensure_single_statement` runs before execution and refuses stacked
//! statements, so a read-only prefix covers the whole candidate.

mod statements;

pub use statements::{ensure_single_statement, MULTIPLE_STATEMENTS};

use std::fmt;

/// Leading keywords of statements that only read data.
pub const READ_ONLY_KEYWORDS: [&str; 6] = ["select", "with", "show", "describe", "desc", "explain"];

/// Comment delimiter tokens removed during normalization.
///
/// Only the delimiters are removed. Comment bodies stay in place, so
/// `select/*INSERT*/1` normalizes to `selectinsert1`.
const COMMENT_TOKENS: [&str; 3] = ["--", "/*", "*/"];

/// Safety level classification for SQL queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyLevel {
    /// Starts with a read-only keyword; a corrected retry may auto-execute it.
    ReadOnly,
    /// Anything else; always requires confirmation.
    Unverified,
}

impl SafetyLevel {
    /// Returns true if this safety level requires user confirmation.
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::Unverified)
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::Unverified => write!(f, "unverified"),
        }
    }
}

/// Normalizes SQL for the keyword check: trim, lowercase, drop comment
/// delimiter tokens, trim again.
pub fn normalize(sql: &str) -> String {
    let mut normalized = sql.trim().to_lowercase();
    for token in COMMENT_TOKENS {
        normalized = normalized.replace(token, "");
    }
    normalized.trim().to_string()
}

/// Returns true if the SQL is lexically read-only.
pub fn is_read_only(sql: &str) -> bool {
    let normalized = normalize(sql);
    READ_ONLY_KEYWORDS
        .iter()
        .any(|keyword| normalized.starts_with(keyword))
}

/// Classifies SQL into a safety level.
pub fn classify_sql(sql: &str) -> SafetyLevel {
    if is_read_only(sql) {
        SafetyLevel::ReadOnly
    } else {
        SafetyLevel::Unverified
    }
}
