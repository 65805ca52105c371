//! semascope: text-embedding workbench
//!
//! Embeds text through a hosted embedding API, stores vectors in a hosted
//! vector index, compares them, and renders them as heatmaps.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncReadExt};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::Config;
use semascope_engine::{
    DEFAULT_DIMENSION, Embedding, Heatmap, HeatmapOptions, NormalizeSession, NormalizeUpdate,
    OpenAiClient, PineconeClient, Visualizer, VoyageClient, WorkflowDeps,
};

/// Text-embedding workbench
///
/// Embeds text, stores vectors in a hosted index, compares them, and
/// renders them as heatmaps.
#[derive(Parser)]
#[command(name = "semascope")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to .semascope directory (default: search for .semascope/config.toml)
    #[arg(long, global = true, env = "SEMASCOPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a piece of text and print the vector
    Embed {
        /// The text to embed
        text: String,

        /// Extra tags appended to the input before embedding
        #[arg(long)]
        tags: Option<String>,

        /// Print the vector as JSON instead of space-separated values
        #[arg(long)]
        json: bool,
    },

    /// Embed two inputs, store both, and report their similarity
    Compare {
        /// First input text
        input1: String,

        /// Second input text
        input2: String,

        /// Directory to write input1.svg and input2.svg into
        #[arg(long)]
        svg_dir: Option<PathBuf>,

        /// Grid columns for the heatmaps
        #[arg(long)]
        columns: Option<usize>,

        /// Color mode: spectrum, red, green, blue
        #[arg(long)]
        mode: Option<String>,
    },

    /// Watch stdin and run the normalization flow on each pause in typing
    Watch {
        /// System prompt for the generalization step
        #[arg(long, default_value = "")]
        system_prompt: String,

        /// Debounce window in milliseconds (overrides config)
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Render a heatmap from a raw JSON vector
    Render {
        /// JSON array of numbers, or '-' to read it from stdin
        input: String,

        /// Write the heatmap as SVG to this path
        #[arg(long)]
        svg: Option<PathBuf>,

        /// Grid columns for the heatmap
        #[arg(long)]
        columns: Option<usize>,

        /// Color mode: spectrum, red, green, blue
        #[arg(long)]
        mode: Option<String>,
    },

    /// Initialize a new .semascope directory with a config file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

/// Initialize logging to stderr for interactive use.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load config from file or auto-discover from `.semascope/config.toml`.
fn load_config(override_path: Option<&PathBuf>) -> Result<Config> {
    let loaded = if let Some(path) = override_path {
        // Explicit path override - treat as path to .semascope directory
        let config_file = if path.is_dir() {
            path.join(config::CONFIG_FILE)
        } else {
            path.clone()
        };
        let loaded = Config::from_file(&config_file)?;
        info!("Loaded config from {}", config_file.display());
        loaded
    } else {
        // Auto-discover by walking up the directory tree
        match Config::find_and_load() {
            Ok(Some((loaded, semascope_dir))) => {
                info!("Found config at {}", semascope_dir.display());
                loaded
            }
            Ok(None) => {
                tracing::debug!("No .semascope/config.toml found, using defaults");
                Config::default()
            }
            Err(e) => {
                tracing::warn!("Error searching for config: {}, using defaults", e);
                Config::default()
            }
        }
    };

    for error in loaded.validate() {
        tracing::warn!("Config: {}", error);
    }

    Ok(loaded)
}

/// Build the provider bundle for the workflow commands.
fn build_deps(config: &Config) -> Result<WorkflowDeps> {
    let embedder = VoyageClient::new(config.voyage_config()?)?;
    let generator = OpenAiClient::new(config.openai_config()?)?;
    let index = PineconeClient::new(config.pinecone_config()?)?;

    Ok(WorkflowDeps::new(
        Arc::new(embedder),
        Arc::new(generator),
        Arc::new(index),
    ))
}

/// Apply CLI overrides on top of the configured heatmap options.
fn heatmap_options(
    config: &Config,
    columns: Option<usize>,
    mode: Option<&str>,
) -> Result<HeatmapOptions> {
    let mut options = config.heatmap_options()?;
    if let Some(columns) = columns {
        options = options.with_columns(columns);
    }
    if let Some(mode) = mode {
        options = options.with_mode(mode.parse().map_err(|e: String| anyhow::anyhow!(e))?);
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Embed { text, tags, json } => {
            let config = load_config(cli.config.as_ref())?;
            let client = VoyageClient::new(config.voyage_config()?)?;

            let embedding = client.embed_with_tags(&text, tags.as_deref()).await;
            if embedding.is_empty() {
                bail!("no embedding available");
            }

            if json {
                println!("{}", serde_json::to_string(&embedding)?);
            } else {
                println!("{embedding}");
            }
        }

        Commands::Compare {
            input1,
            input2,
            svg_dir,
            columns,
            mode,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let options = heatmap_options(&config, columns, mode.as_deref())?;
            let deps = build_deps(&config)?;

            let visualizer = Visualizer::new(deps).with_config(config.visualize_config());
            let comparison = visualizer
                .compare(&input1, &input2)
                .await
                .map_err(|e| anyhow::anyhow!("Error generating embeddings: {e}"))?;

            println!("Similarity {}", comparison.similarity);

            for (label, embedding) in [("input1", &comparison.left), ("input2", &comparison.right)]
            {
                let Some(heatmap) = Heatmap::render(embedding, &options) else {
                    continue;
                };
                println!("\nHeatmap for {label}");
                print!("{}", heatmap.to_ansi());

                if let Some(dir) = &svg_dir {
                    std::fs::create_dir_all(dir)?;
                    let path = dir.join(format!("{label}.svg"));
                    std::fs::write(&path, heatmap.to_svg())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Wrote {}", path.display());
                }
            }
        }

        Commands::Watch {
            system_prompt,
            debounce_ms,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let deps = build_deps(&config)?;

            let mut normalize_config = config.normalize_config(&system_prompt);
            if let Some(ms) = debounce_ms {
                normalize_config =
                    normalize_config.with_debounce(std::time::Duration::from_millis(ms));
            }

            let (handle, mut updates) = NormalizeSession::spawn(deps, normalize_config);

            // Feed stdin lines into the session; EOF drops the handle and
            // tears the session down.
            let reader = tokio::spawn(async move {
                let stdin = tokio::io::BufReader::new(tokio::io::stdin());
                let mut lines = stdin.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !handle.input(line) {
                        break;
                    }
                }
            });

            println!("Type text; a pause submits it. Ctrl-D exits.");
            while let Some(update) = updates.recv().await {
                match update {
                    NormalizeUpdate::Submitted { text } => {
                        println!("submitted: {text}");
                    }
                    NormalizeUpdate::InputEmbedding(embedding) => {
                        println!("input embedding ({} dims): {embedding}", embedding.len());
                    }
                    NormalizeUpdate::GeneralizedText(text) => {
                        println!("generalized: {text}");
                    }
                    NormalizeUpdate::GeneralizedEmbedding(embedding) => {
                        println!(
                            "generalized embedding ({} dims): {embedding}",
                            embedding.len()
                        );
                    }
                    NormalizeUpdate::Similarity(score) => {
                        println!("similarity: {score}");
                    }
                    NormalizeUpdate::Failed { stage, message } => {
                        println!("error at {stage}: {message}");
                    }
                }
            }

            reader.await.ok();
        }

        Commands::Render {
            input,
            svg,
            columns,
            mode,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let options = heatmap_options(&config, columns, mode.as_deref())?;

            let raw = if input == "-" {
                let mut buf = String::new();
                tokio::io::stdin().read_to_string(&mut buf).await?;
                buf
            } else {
                input
            };

            let values: Vec<f32> = serde_json::from_str(raw.trim())
                .map_err(|_| anyhow::anyhow!("Invalid input: expected a JSON array of numbers"))?;
            let embedding = Embedding::new(values);

            let Some(heatmap) = Heatmap::render(&embedding, &options) else {
                bail!("Invalid input: the vector is empty");
            };
            if embedding.len() != DEFAULT_DIMENSION {
                tracing::warn!(
                    len = embedding.len(),
                    expected = DEFAULT_DIMENSION,
                    "Vector has unexpected dimensionality"
                );
            }

            print!("{}", heatmap.to_ansi());

            if let Some(path) = &svg {
                std::fs::write(path, heatmap.to_svg())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Wrote {}", path.display());
            }
        }

        Commands::Init { force } => {
            use config::{CONFIG_FILE, SEMASCOPE_DIR};

            let semascope_dir = PathBuf::from(SEMASCOPE_DIR);
            let config_path = semascope_dir.join(CONFIG_FILE);

            if config_path.exists() && !force {
                bail!(".semascope/config.toml already exists. Use --force to overwrite.");
            }

            if !semascope_dir.exists() {
                std::fs::create_dir_all(&semascope_dir)?;
                info!("Created {}/", semascope_dir.display());
            }

            let default_config = r#"# semascope configuration

[embedding]
model = "voyage-large-2"
# api_key = "pa-..."  # Or use VOYAGE_API_KEY env var

[chat]
model = "gpt-4-turbo"
# api_key = "sk-..."  # Or use OPENAI_API_KEY env var

[index]
namespace = "default"
# host = "https://my-index-abc123.svc.us-east-1-aws.pinecone.io"  # Or PINECONE_INDEX_HOST
# api_key = "..."  # Or use PINECONE_API_KEY env var

[workflow]
debounce_ms = 2000
settle_ms = 1000

[heatmap]
columns = 48
mode = "spectrum"  # Options: "spectrum", "red", "green", "blue"
exponent = 0.65
"#;

            std::fs::write(&config_path, default_config)?;
            info!("Created {}", config_path.display());
            info!("Next steps:");
            info!("  1. Edit .semascope/config.toml with your provider credentials");
            info!("  2. Run 'semascope compare \"a\" \"b\"' to compare two inputs");
            info!("  3. Run 'semascope watch' to normalize text as you type");
        }
    }

    Ok(())
}
