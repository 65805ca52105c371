//! Provider traits and mock implementations.
//!
//! Workflows depend on these traits rather than on the concrete HTTP
//! clients, so external services can be swapped for mocks in tests.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::types::{COMPARISON_ID, Embedding, REFERENCE_ID};

/// Trait for text-embedding providers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a piece of text.
    ///
    /// Returns the empty sentinel when no embedding is available; this
    /// method never fails. Callers must length-check the result before
    /// indexing into it.
    async fn embed(&self, text: &str) -> Embedding;

    /// Dimensionality of vectors this embedder produces.
    fn dimension(&self) -> usize;

    /// Get the name of this provider.
    fn name(&self) -> &str;
}

/// Trait for chat-completion providers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate text from a (system prompt, user text) pair.
    async fn generate(&self, system: &str, text: &str) -> Result<String>;

    /// Get the name of this provider.
    fn name(&self) -> &str;
}

/// Trait for hosted vector indexes.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert a vector under the given identifier.
    ///
    /// Upsert is idempotent per identifier; a later upsert with the same
    /// identifier replaces the prior value.
    async fn upsert(&self, id: u32, values: &Embedding) -> Result<()>;

    /// Similarity between the reference vector and its closest distinct
    /// neighbor in the index.
    async fn nearest_similarity(&self) -> Result<f32>;

    /// Get the name of this provider.
    fn name(&self) -> &str;
}

/// An embedder that can be shared across tasks.
pub type SharedEmbedder = Arc<dyn Embedder>;
/// A generator that can be shared across tasks.
pub type SharedGenerator = Arc<dyn Generator>;
/// A vector index that can be shared across tasks.
pub type SharedVectorIndex = Arc<dyn VectorIndex>;

/// The providers a workflow calls out to.
#[derive(Clone)]
pub struct WorkflowDeps {
    /// Embedding provider.
    pub embedder: SharedEmbedder,
    /// Chat-completion provider.
    pub generator: SharedGenerator,
    /// Hosted vector index.
    pub index: SharedVectorIndex,
}

impl WorkflowDeps {
    /// Bundle the three provider handles.
    pub fn new(
        embedder: SharedEmbedder,
        generator: SharedGenerator,
        index: SharedVectorIndex,
    ) -> Self {
        Self {
            embedder,
            generator,
            index,
        }
    }
}

/// Cosine similarity between two vectors.
///
/// A zero-magnitude operand yields 0.0 rather than a division by zero.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// A mock embedder for testing.
///
/// Responses queued with [`MockEmbedder::push_response`] are returned in
/// order; once the queue is empty a deterministic vector derived from the
/// input text is synthesized. All inputs are captured for assertions.
#[derive(Debug)]
pub struct MockEmbedder {
    dimension: usize,
    always_empty: bool,
    responses: Mutex<VecDeque<Embedding>>,
    requests: Mutex<Vec<String>>,
}

impl MockEmbedder {
    /// Create a mock producing vectors of the given dimensionality.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            always_empty: false,
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the empty sentinel.
    pub fn always_empty() -> Self {
        Self {
            dimension: 0,
            always_empty: true,
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response to be returned before synthesis kicks in.
    pub fn push_response(&self, embedding: Embedding) {
        self.responses.lock().unwrap().push_back(embedding);
    }

    /// All inputs that were embedded, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of embed calls made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn synthesize(&self, text: &str) -> Embedding {
        let bytes = text.as_bytes();
        let values = (0..self.dimension)
            .map(|i| {
                let b = if bytes.is_empty() {
                    0
                } else {
                    bytes[i % bytes.len()]
                };
                f32::from(b) / 127.5 - 1.0
            })
            .collect();
        Embedding::new(values)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Embedding {
        self.requests.lock().unwrap().push(text.to_string());
        if self.always_empty {
            return Embedding::empty();
        }
        if let Some(queued) = self.responses.lock().unwrap().pop_front() {
            return queued;
        }
        self.synthesize(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "mock-embedder"
    }
}

/// A mock generator for testing.
///
/// Returns queued responses in order. If more requests are made than
/// responses are available, an error is returned.
#[derive(Debug)]
pub struct MockGenerator {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockGenerator {
    /// Create a mock with the given responses.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with a single text response.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![text.into()])
    }

    /// All (system, text) pairs that were submitted, in order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of generate calls made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, system: &str, text: &str) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((system.to_string(), text.to_string()));
        self.responses.lock().unwrap().pop_front().ok_or_else(|| {
            EngineError::Provider("MockGenerator: no more responses queued".to_string())
        })
    }

    fn name(&self) -> &str {
        "mock-generator"
    }
}

/// A mock vector index for testing.
///
/// Keeps records in memory, so upsert-replaces semantics are observable,
/// and computes the similarity score as the cosine between the reference
/// and comparison slots unless a fixed score is scripted.
#[derive(Debug, Default)]
pub struct MockIndex {
    records: Mutex<HashMap<u32, Embedding>>,
    scripted_score: Mutex<Option<f32>>,
    fail_calls: bool,
    upserts: Mutex<Vec<u32>>,
}

impl MockIndex {
    /// Create an empty mock index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock whose calls all fail with a network error.
    pub fn failing() -> Self {
        Self {
            fail_calls: true,
            ..Self::default()
        }
    }

    /// Script a fixed similarity score instead of computing cosine.
    pub fn with_similarity(self, score: f32) -> Self {
        *self.scripted_score.lock().unwrap() = Some(score);
        self
    }

    /// The vector currently stored under an identifier.
    pub fn record(&self, id: u32) -> Option<Embedding> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    /// Identifiers upserted, in call order.
    pub fn upserted_ids(&self) -> Vec<u32> {
        self.upserts.lock().unwrap().clone()
    }

    /// Number of upsert calls made.
    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }
}

#[async_trait]
impl VectorIndex for MockIndex {
    async fn upsert(&self, id: u32, values: &Embedding) -> Result<()> {
        if self.fail_calls {
            return Err(EngineError::Network("MockIndex: upsert failed".to_string()));
        }
        self.upserts.lock().unwrap().push(id);
        self.records.lock().unwrap().insert(id, values.clone());
        Ok(())
    }

    async fn nearest_similarity(&self) -> Result<f32> {
        if self.fail_calls {
            return Err(EngineError::Network("MockIndex: query failed".to_string()));
        }
        if let Some(score) = *self.scripted_score.lock().unwrap() {
            return Ok(score);
        }
        let records = self.records.lock().unwrap();
        let reference = records.get(&REFERENCE_ID).ok_or_else(|| {
            EngineError::Provider("query returned no match for the reference vector".to_string())
        })?;
        let comparison = records.get(&COMPARISON_ID).ok_or_else(|| {
            EngineError::Provider("query returned no second match".to_string())
        })?;
        Ok(cosine_similarity(reference.values(), comparison.values()))
    }

    fn name(&self) -> &str {
        "mock-index"
    }
}
