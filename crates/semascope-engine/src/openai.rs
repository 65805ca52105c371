//! OpenAI chat-completion client.
//!
//! Non-streaming subset of the OpenAI-compatible chat API: a system
//! prompt and user text in, generated text out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, header};

use crate::error::{EngineError, Result};
use crate::provider::Generator;

/// Default OpenAI API base URL.
const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default model for completions.
const DEFAULT_MODEL: &str = "gpt-4-turbo";

/// Configuration for the OpenAI chat client.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// Model to use for completions.
    pub model: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create config from environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            EngineError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// OpenAI chat-completion client.
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a new client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a client from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    /// Build the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url)
    }

    /// Add authentication headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
    }

    /// Run one completion for a (system prompt, user text) pair.
    pub async fn complete(&self, system: &str, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        tracing::debug!(
            model = %self.config.model,
            chars = text.len(),
            "Sending chat completion request"
        );

        let response = self
            .add_headers(self.client.post(self.completions_url()))
            .json(&request)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle a successful response.
    async fn handle_response(response: Response) -> Result<String> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EngineError::Provider("chat completion returned no content".to_string()))
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> EngineError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(error) = serde_json::from_str::<OpenAiErrorResponse>(&body) {
            match status.as_u16() {
                401 => EngineError::Config(format!("Authentication failed: {}", error.error.message)),
                429 => EngineError::Provider(format!("Rate limit exceeded: {}", error.error.message)),
                500..=599 => EngineError::Provider(format!("Server error: {}", error.error.message)),
                _ => EngineError::Provider(error.error.message),
            }
        } else {
            EngineError::Provider(format!("HTTP {}: {}", status, body))
        }
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn generate(&self, system: &str, text: &str) -> Result<String> {
        self.complete(system, text).await
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// Request/Response types for the OpenAI-compatible chat API
// ============================================================================

#[derive(Debug, serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, serde::Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiError {
    message: String,
}
