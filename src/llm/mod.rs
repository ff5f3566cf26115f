//! LLM integration for askdb.
//!
//! Provides the model-client trait, the Ollama implementation, and the
//! prompt and response helpers used by the retry loop.

pub mod mock;
pub mod ollama;
pub mod prompt;
pub mod sanitize;

pub use mock::{FailingLlmClient, MockLlmClient};
pub use ollama::{OllamaClient, OllamaConfig, OllamaStatus};
pub use prompt::PromptBuilder;
pub use sanitize::clean_sql_response;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// Trait for LLM clients that turn a prompt into a completion.
///
/// The model name and sampling temperature belong to the client's own
/// configuration. Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given prompt.
    ///
    /// Fails with `AskError::Llm` when the service is unreachable or replies
    /// with something that is not a completion.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_implements_trait() {
        let client: Box<dyn LlmClient> =
            Box::new(MockLlmClient::new().with_response("```sql\nSELECT 1\n```"));
        let response = client.generate("anything").await.unwrap();
        assert_eq!(clean_sql_response(&response), "SELECT 1");
    }
}
