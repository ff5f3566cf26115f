//! Shared test doubles for the session tests.

use askdb::db::QueryResult;
use askdb::error::Result;
use askdb::safety::SafetyLevel;
use askdb::session::{Confirmer, SessionReporter};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Answers confirmations from a script (then "no") and records each prompt.
#[derive(Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, sql: &str) -> Result<bool> {
        self.asked.lock().unwrap().push(sql.to_string());
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or(false))
    }
}

/// Records reporter events as short strings.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl SessionReporter for RecordingReporter {
    fn attempt_started(&self, attempt: u32, max_attempts: u32) {
        self.push(format!("attempt {attempt}/{max_attempts}"));
    }

    fn sql_generated(&self, _attempt: u32, sql: &str, safety: SafetyLevel) {
        self.push(format!("sql [{safety}] {sql}"));
    }

    fn auto_executing(&self, _sql: &str) {
        self.push("auto".to_string());
    }

    fn query_failed(&self, attempt: u32, error: &str) {
        self.push(format!("failed {attempt}: {error}"));
    }

    fn retrying(&self, next_attempt: u32, _max_attempts: u32) {
        self.push(format!("retry {next_attempt}"));
    }

    fn results(&self, result: &QueryResult) {
        self.push(format!("results {}", result.row_count));
    }

    fn declined(&self) {
        self.push("declined".to_string());
    }
}
