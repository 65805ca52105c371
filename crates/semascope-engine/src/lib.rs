//! semascope-engine: embedding workbench core
//!
//! This crate provides the building blocks for the semascope workbench:
//! - Clients for the hosted embedding, chat-completion, and vector-index APIs
//! - Provider traits with mock implementations for deterministic tests
//! - The debounced normalization workflow and the comparison workflow
//! - A pure heatmap renderer with SVG and ANSI serializers

pub mod error;
pub mod heatmap;
pub mod normalize;
pub mod openai;
pub mod pinecone;
pub mod provider;
pub mod types;
pub mod visualize;
pub mod voyage;


pub use error::{EngineError, Result};
pub use heatmap::{
    ColorMode, DEFAULT_CELL_SIZE, DEFAULT_COLUMNS, DEFAULT_EXPONENT, Heatmap, HeatmapCell,
    HeatmapOptions, Rgb, cell_color, stretch,
};
pub use normalize::{
    DEFAULT_DEBOUNCE, DEFAULT_SETTLE, NormalizeConfig, NormalizeHandle, NormalizeSession,
    NormalizeStage, NormalizeUpdate,
};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use pinecone::{PineconeClient, PineconeConfig};
pub use provider::{
    Embedder, Generator, MockEmbedder, MockGenerator, MockIndex, SharedEmbedder, SharedGenerator,
    SharedVectorIndex, VectorIndex, WorkflowDeps,
};
pub use types::{COMPARISON_ID, DEFAULT_DIMENSION, Embedding, REFERENCE_ID, VectorRecord};
pub use visualize::{Comparison, VisualizeConfig, Visualizer};
pub use voyage::{VoyageClient, VoyageConfig};
