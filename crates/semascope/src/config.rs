//! Configuration file support for semascope.
//!
//! All semascope data lives in a `.semascope/` directory:
//! - `.semascope/config.toml` - Configuration file
//!
//! Config discovery searches for `.semascope/config.toml` starting from
//! the current directory and walking up to parent directories. Provider
//! credentials fall back to environment variables when absent from the
//! file.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// The semascope data directory name.
pub const SEMASCOPE_DIR: &str = ".semascope";
/// The config file name within the semascope directory.
pub const CONFIG_FILE: &str = "config.toml";

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use semascope_engine::{
    ColorMode, HeatmapOptions, NormalizeConfig, OpenAiConfig, PineconeConfig, VisualizeConfig,
    VoyageConfig,
};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Chat-completion provider settings.
    pub chat: ChatConfig,
    /// Vector index settings.
    pub index: IndexConfig,
    /// Workflow timing settings.
    pub workflow: WorkflowConfig,
    /// Heatmap rendering settings.
    pub heatmap: HeatmapConfig,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// API key (or use VOYAGE_API_KEY env var).
    pub api_key: Option<String>,
    /// API base URL override.
    pub base_url: Option<String>,
    /// Embedding model.
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: "voyage-large-2".to_string(),
        }
    }
}

/// Chat-completion provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    /// API key (or use OPENAI_API_KEY env var).
    pub api_key: Option<String>,
    /// API base URL override.
    pub base_url: Option<String>,
    /// Completion model.
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: "gpt-4-turbo".to_string(),
        }
    }
}

/// Vector index configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    /// API key (or use PINECONE_API_KEY env var).
    pub api_key: Option<String>,
    /// Data-plane host URL of the index (or PINECONE_INDEX_HOST env var).
    pub host: Option<String>,
    /// Namespace all operations are scoped to.
    pub namespace: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            host: None,
            namespace: "default".to_string(),
        }
    }
}

/// Workflow timing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Debounce window in milliseconds after the last input event.
    pub debounce_ms: u64,
    /// Settle delay in milliseconds before the similarity query.
    pub settle_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            settle_ms: 1000,
        }
    }
}

/// Heatmap rendering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Number of grid columns.
    pub columns: usize,
    /// Color mode: "spectrum", "red", "green", or "blue".
    pub mode: String,
    /// Power-law stretch exponent, in (0, 1].
    pub exponent: f32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            columns: 48,
            mode: "spectrum".to_string(),
            exponent: 0.65,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Find and load configuration from current or parent directories.
    ///
    /// Searches for `.semascope/config.toml` starting from the current
    /// directory and walking up to parent directories.
    pub fn find_and_load() -> Result<Option<(Self, PathBuf)>> {
        let current = std::env::current_dir()?;
        Self::find_and_load_from(&current)
    }

    /// Find and load configuration starting from a specific directory.
    pub fn find_and_load_from(start: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start.to_path_buf();

        loop {
            let semascope_dir = dir.join(SEMASCOPE_DIR);
            let config_path = semascope_dir.join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::from_file(&config_path)?;
                return Ok(Some((config, semascope_dir)));
            }

            if !dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Build the embedding client configuration.
    pub fn voyage_config(&self) -> Result<VoyageConfig> {
        let api_key = self
            .embedding
            .api_key
            .clone()
            .or_else(|| std::env::var("VOYAGE_API_KEY").ok())
            .context("Voyage API key required. Set [embedding] api_key or VOYAGE_API_KEY")?;

        let mut config = VoyageConfig::new(api_key).with_model(&self.embedding.model);
        if let Some(url) = &self.embedding.base_url {
            config = config.with_base_url(url);
        }
        Ok(config)
    }

    /// Build the chat client configuration.
    pub fn openai_config(&self) -> Result<OpenAiConfig> {
        let api_key = self
            .chat
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .context("OpenAI API key required. Set [chat] api_key or OPENAI_API_KEY")?;

        let mut config = OpenAiConfig::new(api_key).with_model(&self.chat.model);
        if let Some(url) = &self.chat.base_url {
            config = config.with_base_url(url);
        }
        Ok(config)
    }

    /// Build the vector index client configuration.
    pub fn pinecone_config(&self) -> Result<PineconeConfig> {
        let api_key = self
            .index
            .api_key
            .clone()
            .or_else(|| std::env::var("PINECONE_API_KEY").ok())
            .context("Pinecone API key required. Set [index] api_key or PINECONE_API_KEY")?;
        let host = self
            .index
            .host
            .clone()
            .or_else(|| std::env::var("PINECONE_INDEX_HOST").ok())
            .context("Pinecone index host required. Set [index] host or PINECONE_INDEX_HOST")?;

        Ok(PineconeConfig::new(api_key, host).with_namespace(&self.index.namespace))
    }

    /// Build heatmap rendering options.
    pub fn heatmap_options(&self) -> Result<HeatmapOptions> {
        let mode: ColorMode = self
            .heatmap
            .mode
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        Ok(HeatmapOptions::new()
            .with_columns(self.heatmap.columns)
            .with_mode(mode)
            .with_exponent(self.heatmap.exponent))
    }

    /// Build the normalization workflow configuration.
    pub fn normalize_config(&self, system_prompt: &str) -> NormalizeConfig {
        NormalizeConfig::new()
            .with_system_prompt(system_prompt)
            .with_debounce(Duration::from_millis(self.workflow.debounce_ms))
            .with_settle(Duration::from_millis(self.workflow.settle_ms))
    }

    /// Build the comparison workflow configuration.
    pub fn visualize_config(&self) -> VisualizeConfig {
        VisualizeConfig::new().with_settle(Duration::from_millis(self.workflow.settle_ms))
    }
}

/// Configuration validation error.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

impl Config {
    /// Validate the configuration.
    ///
    /// Returns a list of validation errors if any are found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.embedding.model.is_empty() {
            errors.push(ConfigValidationError {
                field: "embedding.model".to_string(),
                message: "Embedding model cannot be empty.".to_string(),
            });
        }

        if self.chat.model.is_empty() {
            errors.push(ConfigValidationError {
                field: "chat.model".to_string(),
                message: "Chat model cannot be empty.".to_string(),
            });
        }

        if self.index.namespace.is_empty() {
            errors.push(ConfigValidationError {
                field: "index.namespace".to_string(),
                message: "Index namespace cannot be empty.".to_string(),
            });
        }

        if self.heatmap.columns == 0 {
            errors.push(ConfigValidationError {
                field: "heatmap.columns".to_string(),
                message: "Heatmap columns must be at least 1.".to_string(),
            });
        }

        if self.heatmap.mode.parse::<ColorMode>().is_err() {
            errors.push(ConfigValidationError {
                field: "heatmap.mode".to_string(),
                message: format!(
                    "Invalid mode '{}'. Expected 'spectrum', 'red', 'green', or 'blue'.",
                    self.heatmap.mode
                ),
            });
        }

        if !(self.heatmap.exponent > 0.0 && self.heatmap.exponent <= 1.0) {
            errors.push(ConfigValidationError {
                field: "heatmap.exponent".to_string(),
                message: "Exponent must be in (0, 1].".to_string(),
            });
        }

        errors
    }
}
