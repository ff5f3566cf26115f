//! Ollama LLM client implementation.
//!
//! Implements the LlmClient trait against a local Ollama instance using the
//! non-streaming `/api/generate` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::{LlmConfig, DEFAULT_OLLAMA_URL};
use crate::error::{AskError, Result};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Timeout for the startup status check.
const STATUS_TIMEOUT: Duration = Duration::from_millis(1200);

/// Ollama client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model to use (e.g., "llama3.2", "codellama").
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl OllamaConfig {
    /// Creates a new config with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: model.into(),
            temperature: 0.95,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new("llama3.2")
    }
}

impl From<&LlmConfig> for OllamaConfig {
    fn from(config: &LlmConfig) -> Self {
        Self::new(config.model.clone())
            .with_url(config.base_url.clone())
            .with_temperature(config.temperature)
            .with_timeout(config.timeout_secs)
    }
}

/// Reachability of the Ollama service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OllamaStatus {
    /// The service answered the status check.
    Running,
    /// The service answered with a non-success status code.
    HttpStatus(u16),
    /// Nothing answered within the status timeout.
    Unreachable,
}

impl fmt::Display for OllamaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::HttpStatus(code) => write!(f, "HTTP {code}"),
            Self::Unreachable => write!(f, "not reachable"),
        }
    }
}

/// Ollama LLM client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
}

impl OllamaClient {
    /// Creates a new Ollama client with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AskError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Probes the service with a short timeout.
    pub async fn status(&self) -> OllamaStatus {
        match self
            .client
            .get(self.endpoint("api/tags"))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => OllamaStatus::Running,
            Ok(response) => OllamaStatus::HttpStatus(response.status().as_u16()),
            Err(_) => OllamaStatus::Unreachable,
        }
    }

    /// Returns the URL for an API path, tolerating a trailing slash in the base URL.
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("api/generate"))
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AskError::llm("Request timed out. Try again.")
                } else if e.is_connect() {
                    AskError::llm(format!(
                        "Failed to connect to Ollama at {}. Is it running? Try: ollama serve",
                        self.config.base_url
                    ))
                } else {
                    AskError::llm(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AskError::llm(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(AskError::llm(format!(
                "Ollama API error ({}): {}",
                status, body
            )));
        }

        parse_generate_response(&body)
    }
}

/// Extracts the completion text from a `/api/generate` response body.
fn parse_generate_response(body: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| AskError::llm(format!("Failed to parse response: {}", e)))?;
    Ok(response.response)
}

// Ollama API types

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}
