//! Side-by-side comparison workflow.
//!
//! Embeds two independent inputs in parallel, stores both, and asks the
//! index how similar they are. Heatmaps are only built from the result,
//! whose embeddings are non-empty by construction.

use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::normalize::DEFAULT_SETTLE;
use crate::provider::WorkflowDeps;
use crate::types::{COMPARISON_ID, Embedding, REFERENCE_ID};

/// Configuration for the comparison workflow.
#[derive(Debug, Clone)]
pub struct VisualizeConfig {
    /// Settle delay before the similarity query.
    pub settle: Duration,
}

impl Default for VisualizeConfig {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE,
        }
    }
}

impl VisualizeConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the settle delay.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

/// The outcome of a comparison: both embeddings and their similarity.
///
/// Both embeddings are guaranteed non-empty.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Embedding of the first input.
    pub left: Embedding,
    /// Embedding of the second input.
    pub right: Embedding,
    /// Similarity score between the stored vectors.
    pub similarity: f32,
}

/// Runs the comparison workflow.
pub struct Visualizer {
    deps: WorkflowDeps,
    config: VisualizeConfig,
}

impl Visualizer {
    /// Create a visualizer over the given providers.
    pub fn new(deps: WorkflowDeps) -> Self {
        Self {
            deps,
            config: VisualizeConfig::default(),
        }
    }

    /// Replace the workflow configuration.
    pub fn with_config(mut self, config: VisualizeConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the comparison workflow for two independent inputs.
    ///
    /// The two embeddings are fetched in parallel; there is no ordering
    /// requirement between them. An empty embedding for either input
    /// aborts the workflow before anything is stored.
    pub async fn compare(&self, input1: &str, input2: &str) -> Result<Comparison> {
        let (left, right) = tokio::join!(
            self.deps.embedder.embed(input1),
            self.deps.embedder.embed(input2),
        );

        if left.is_empty() || right.is_empty() {
            return Err(EngineError::Provider(
                "no embedding available for one of the inputs".to_string(),
            ));
        }

        self.deps.index.upsert(REFERENCE_ID, &left).await?;
        self.deps.index.upsert(COMPARISON_ID, &right).await?;

        // The hosted index needs a moment before fresh vectors are queryable.
        tokio::time::sleep(self.config.settle).await;

        let similarity = self.deps.index.nearest_similarity().await?;
        tracing::info!(similarity, "Comparison complete");

        Ok(Comparison {
            left,
            right,
            similarity,
        })
    }
}
