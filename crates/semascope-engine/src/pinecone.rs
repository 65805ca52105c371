//! Pinecone vector index client.
//!
//! Namespaced upsert plus the index's two-hop nearest-neighbor query.
//! The two-hop pattern is the store's query contract and is kept as-is
//! rather than generalized into a similarity search.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, header};

use crate::error::{EngineError, Result};
use crate::provider::VectorIndex;
use crate::types::{Embedding, REFERENCE_ID, VectorRecord};

/// Default namespace within the index.
const DEFAULT_NAMESPACE: &str = "default";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for the Pinecone client.
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Data-plane host URL of the index.
    pub host: String,

    /// Namespace all operations are scoped to.
    pub namespace: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl PineconeConfig {
    /// Create a new config for the given index host.
    pub fn new(api_key: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: host.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY").map_err(|_| {
            EngineError::Config("PINECONE_API_KEY environment variable not set".to_string())
        })?;
        let host = std::env::var("PINECONE_INDEX_HOST").map_err(|_| {
            EngineError::Config("PINECONE_INDEX_HOST environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key, host))
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Pinecone index client.
pub struct PineconeClient {
    client: Client,
    config: PineconeConfig,
}

impl PineconeClient {
    /// Create a new client with the given configuration.
    pub fn new(config: PineconeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a client from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(PineconeConfig::from_env()?)
    }

    /// Build the upsert endpoint URL.
    fn upsert_url(&self) -> String {
        format!("{}/vectors/upsert", self.config.host)
    }

    /// Build the query endpoint URL.
    fn query_url(&self) -> String {
        format!("{}/query", self.config.host)
    }

    /// Add authentication headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Api-Key", &self.config.api_key)
            .header(header::CONTENT_TYPE, "application/json")
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> EngineError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(error) = serde_json::from_str::<PineconeErrorResponse>(&body) {
            match status.as_u16() {
                401 | 403 => EngineError::Config(format!("Authentication failed: {}", error.message)),
                429 => EngineError::Provider(format!("Rate limit exceeded: {}", error.message)),
                500..=599 => EngineError::Provider(format!("Server error: {}", error.message)),
                _ => EngineError::Provider(error.message),
            }
        } else {
            EngineError::Provider(format!("HTTP {}: {}", status, body))
        }
    }

    /// Run one query against the index.
    async fn query(&self, request: QueryRequest<'_>) -> Result<QueryResponse> {
        let response = self
            .add_headers(self.client.post(self.query_url()))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| EngineError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl VectorIndex for PineconeClient {
    async fn upsert(&self, id: u32, values: &Embedding) -> Result<()> {
        let request = UpsertRequest {
            vectors: vec![VectorRecord::new(id, values)],
            namespace: &self.config.namespace,
        };

        let response = self
            .add_headers(self.client.post(self.upsert_url()))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        tracing::debug!(id, namespace = %self.config.namespace, "Vector upserted");
        Ok(())
    }

    async fn nearest_similarity(&self) -> Result<f32> {
        // First hop: fetch the reference vector's nearest stored neighbor,
        // values included.
        let by_id = self
            .query(QueryRequest::by_id(
                REFERENCE_ID,
                1,
                true,
                &self.config.namespace,
            ))
            .await?;

        let neighbor = by_id.matches.into_iter().next().ok_or_else(|| {
            EngineError::Provider("query returned no match for the reference vector".to_string())
        })?;
        tracing::debug!(neighbor = %neighbor.id, "Reference neighbor fetched");

        let values = neighbor.values.ok_or_else(|| {
            EngineError::Provider("query match carried no vector values".to_string())
        })?;

        // Second hop: rank the index against that neighbor's own vector and
        // take the second match's score.
        let by_vector = self
            .query(QueryRequest::by_vector(values, 2, &self.config.namespace))
            .await?;

        by_vector
            .matches
            .get(1)
            .and_then(|m| m.score)
            .ok_or_else(|| EngineError::Provider("query returned no second match".to_string()))
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

// ============================================================================
// Request/Response types for the Pinecone data-plane API
// ============================================================================

#[derive(Debug, serde::Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<VectorRecord>,
    namespace: &'a str,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector: Option<Vec<f32>>,
    top_k: u32,
    include_values: bool,
    namespace: &'a str,
}

impl<'a> QueryRequest<'a> {
    fn by_id(id: u32, top_k: u32, include_values: bool, namespace: &'a str) -> Self {
        Self {
            id: Some(id.to_string()),
            vector: None,
            top_k,
            include_values,
            namespace,
        }
    }

    fn by_vector(vector: Vec<f32>, top_k: u32, namespace: &'a str) -> Self {
        Self {
            id: None,
            vector: Some(vector),
            top_k,
            include_values: false,
            namespace,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, serde::Deserialize)]
struct QueryMatch {
    id: String,
    score: Option<f32>,
    values: Option<Vec<f32>>,
}

#[derive(Debug, serde::Deserialize)]
struct PineconeErrorResponse {
    message: String,
}
