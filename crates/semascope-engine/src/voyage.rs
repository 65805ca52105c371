//! Voyage AI embedding client.
//!
//! Speaks the hosted embeddings API: text in, fixed-length vector out.
//! Failures never propagate; the empty sentinel is returned instead, so
//! callers treat an empty vector as "no embedding available".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, header};

use crate::error::{EngineError, Result};
use crate::provider::Embedder;
use crate::types::{DEFAULT_DIMENSION, Embedding};

/// Default Voyage API base URL.
const DEFAULT_API_BASE: &str = "https://api.voyageai.com";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default embedding model.
const DEFAULT_MODEL: &str = "voyage-large-2";

/// Configuration for the Voyage embedding client.
#[derive(Debug, Clone)]
pub struct VoyageConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// Embedding model to use.
    pub model: String,

    /// Dimensionality of vectors the model produces.
    pub dimension: usize,

    /// Request timeout.
    pub timeout: Duration,
}

impl VoyageConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create config from environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("VOYAGE_API_KEY").map_err(|_| {
            EngineError::Config("VOYAGE_API_KEY environment variable not set".to_string())
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

    /// Set the expected vector dimensionality.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Voyage embedding client.
pub struct VoyageClient {
    client: Client,
    config: VoyageConfig,
}

impl VoyageClient {
    /// Create a new client with the given configuration.
    pub fn new(config: VoyageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a client from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(VoyageConfig::from_env()?)
    }

    /// Build the embeddings endpoint URL.
    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.config.base_url)
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

    /// Fetch an embedding, propagating failures.
    async fn fetch(&self, input: &str) -> Result<Embedding> {
        let request = VoyageEmbeddingRequest {
            input,
            model: &self.config.model,
        };

        let response = self
            .add_headers(self.client.post(self.embeddings_url()))
            .json(&request)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle a successful response.
    async fn handle_response(response: Response) -> Result<Embedding> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: VoyageEmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;

        tracing::debug!(
            model = %parsed.model,
            total_tokens = parsed.usage.total_tokens,
            "Embedding received"
        );

        let values = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default();
        Ok(Embedding::new(values))
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> EngineError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(error) = serde_json::from_str::<VoyageErrorResponse>(&body) {
            match status.as_u16() {
                401 => EngineError::Config(format!("Authentication failed: {}", error.detail)),
                429 => EngineError::Provider(format!("Rate limit exceeded: {}", error.detail)),
                500..=599 => EngineError::Provider(format!("Server error: {}", error.detail)),
                _ => EngineError::Provider(error.detail),
            }
        } else {
            EngineError::Provider(format!("HTTP {}: {}", status, body))
        }
    }

    /// Embed text with an optional tag string appended to the input.
    ///
    /// All failures collapse to the empty sentinel here; the error is
    /// logged and never propagated.
    pub async fn embed_with_tags(&self, text: &str, tags: Option<&str>) -> Embedding {
        let input = match tags {
            Some(tags) => format!("{} {}", text, tags),
            None => text.to_string(),
        };

        match self.fetch(&input).await {
            Ok(embedding) => {
                if !embedding.is_empty() && embedding.len() != self.config.dimension {
                    tracing::warn!(
                        len = embedding.len(),
                        expected = self.config.dimension,
                        "Embedding has unexpected dimensionality"
                    );
                }
                embedding
            }
            Err(e) => {
                tracing::warn!(error = %e, "Embedding request failed, returning empty vector");
                Embedding::empty()
            }
        }
    }
}

#[async_trait]
impl Embedder for VoyageClient {
    async fn embed(&self, text: &str) -> Embedding {
        self.embed_with_tags(text, None).await
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn name(&self) -> &str {
        "voyage"
    }
}

// ============================================================================
// Request/Response types for the Voyage embeddings API
// ============================================================================

#[derive(Debug, serde::Serialize)]
struct VoyageEmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct VoyageEmbeddingResponse {
    data: Vec<VoyageEmbeddingData>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: VoyageUsage,
}

#[derive(Debug, serde::Deserialize)]
struct VoyageEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct VoyageUsage {
    total_tokens: u32,
}

#[derive(Debug, serde::Deserialize)]
struct VoyageErrorResponse {
    detail: String,
}
