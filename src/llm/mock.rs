//! Mock LLM clients for testing.
//!
//! Replays a scripted sequence of completions and records every prompt it
//! receives, so tests can assert on both sides of the conversation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::error::{AskError, Result};
use crate::llm::LlmClient;

#[derive(Debug, Clone)]
enum MockReply {
    Completion(String),
    Failure(String),
}

/// Mock LLM client that replays scripted replies in order.
///
/// Once the script runs out every call fails, which keeps a runaway retry
/// loop from passing silently.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<MockReply>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    /// Creates a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a completion to the script.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        lock(&self.replies).push_back(MockReply::Completion(response.into()));
        self
    }

    /// Appends a client failure to the script.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        lock(&self.replies).push_back(MockReply::Failure(message.into()));
        self
    }

    /// Returns every prompt received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Returns the number of generate calls made so far.
    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        lock(&self.prompts).push(prompt.to_string());

        match lock(&self.replies).pop_front() {
            Some(MockReply::Completion(text)) => Ok(text),
            Some(MockReply::Failure(message)) => Err(AskError::llm(message)),
            None => Err(AskError::llm("Mock script exhausted")),
        }
    }
}

/// LLM client that always fails as if Ollama were not running.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingLlmClient;

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(AskError::llm(
            "Failed to connect to Ollama. Is it running? Try: ollama serve",
        ))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
