//! Response cleanup for LLM outputs.
//!
//! Models are told to answer with bare SQL but often wrap it in a markdown
//! code fence anyway. This strips the fence so the statement can be
//! classified and executed.

use regex::Regex;
use std::sync::OnceLock;

/// Markdown code fence marker.
const FENCE: &str = "```";

/// Matches a leading fence opener with an optional language tag.
///
/// A tag on its own line (```` ```sql\n ````, ```` ```mysql\n ````) is removed
/// with the newline. Without a newline only a literal `sql` tag is removed, so
/// ```` ```SELECT 1``` ```` keeps its first keyword.
fn opener() -> &'static Regex {
    static OPENER: OnceLock<Regex> = OnceLock::new();
    OPENER.get_or_init(|| {
        Regex::new(r"^```(?:[a-z0-9_+-]*[ \t]*\r?\n|(?i:sql)\b)?").expect("opener regex is valid")
    })
}

/// Strips surrounding whitespace and code fences from a model completion.
///
/// Stripping repeats until nothing changes, so stacked fences are fully
/// removed and cleaning an already clean string is a no-op.
pub fn clean_sql_response(raw: &str) -> String {
    let mut current = raw.trim();

    loop {
        let mut next = current;

        if let Some(found) = opener().find(next) {
            next = next[found.end()..].trim();
        }
        if let Some(stripped) = next.strip_suffix(FENCE) {
            next = stripped.trim();
        }

        if next.len() == current.len() {
            return current.to_string();
        }
        current = next;
    }
}
