//! Debounced normalization workflow.
//!
//! A session runs an event loop over input events: each event resets a
//! debounce timer, and when the timer fires the newest text is pushed
//! through embed → store → generalize → embed → store → similarity,
//! emitting an update after each step. A step's failure emits a `Failed`
//! update and abandons the rest of the submission; nothing is rolled
//! back, later fields simply stay unset.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use crate::provider::WorkflowDeps;
use crate::types::{COMPARISON_ID, Embedding, REFERENCE_ID};

/// Default debounce window after the last input event.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Default settle delay between the last upsert and the similarity query.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(1000);

/// Configuration for a normalization session.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// System prompt for the generalization step.
    pub system_prompt: String,

    /// Debounce window after the last input event.
    pub debounce: Duration,

    /// Settle delay before the similarity query.
    pub settle: Duration,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            debounce: DEFAULT_DEBOUNCE,
            settle: DEFAULT_SETTLE,
        }
    }
}

impl NormalizeConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the settle delay.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

/// Pipeline stages, for failure reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeStage {
    /// Embedding the raw input.
    InputEmbedding,
    /// Storing the input embedding.
    StoreInput,
    /// Generalizing the input text.
    Generation,
    /// Embedding the generalized text.
    GeneralizedEmbedding,
    /// Storing the generalized embedding.
    StoreGeneralized,
    /// Querying the similarity score.
    Similarity,
}

impl fmt::Display for NormalizeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NormalizeStage::InputEmbedding => "input embedding",
            NormalizeStage::StoreInput => "store input",
            NormalizeStage::Generation => "generation",
            NormalizeStage::GeneralizedEmbedding => "generalized embedding",
            NormalizeStage::StoreGeneralized => "store generalized",
            NormalizeStage::Similarity => "similarity",
        };
        write!(f, "{}", name)
    }
}

/// Updates emitted while a submission runs.
#[derive(Debug, Clone)]
pub enum NormalizeUpdate {
    /// The debounce timer fired and a submission started.
    Submitted {
        /// The text being submitted.
        text: String,
    },
    /// Embedding of the raw input, stored under the reference id.
    InputEmbedding(Embedding),
    /// Text returned by the generalization step.
    GeneralizedText(String),
    /// Embedding of the generalized text, stored under the comparison id.
    GeneralizedEmbedding(Embedding),
    /// Similarity between the two stored vectors.
    Similarity(f32),
    /// A step failed; later updates for this submission are not emitted.
    Failed {
        /// The stage that failed.
        stage: NormalizeStage,
        /// User-visible message.
        message: String,
    },
}

/// Handle for pushing input events into a running session.
///
/// Dropping the handle closes the input channel; the session tears down
/// and cancels any pending debounce timer.
pub struct NormalizeHandle {
    input_tx: mpsc::UnboundedSender<String>,
}

impl NormalizeHandle {
    /// Push a new input event, restarting the debounce window.
    ///
    /// Returns false once the session is gone.
    pub fn input(&self, text: impl Into<String>) -> bool {
        self.input_tx.send(text.into()).is_ok()
    }
}

/// A running normalization session.
pub struct NormalizeSession;

impl NormalizeSession {
    /// Spawn the session event loop.
    ///
    /// Returns the input handle and the update stream. The session ends
    /// when the handle is dropped.
    pub fn spawn(
        deps: WorkflowDeps,
        config: NormalizeConfig,
    ) -> (NormalizeHandle, mpsc::UnboundedReceiver<NormalizeUpdate>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_loop(deps, config, input_rx, update_tx));

        (NormalizeHandle { input_tx }, update_rx)
    }
}

/// Sleep until the deadline, if there is one. Only polled when armed.
async fn debounce_timer(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        sleep_until(deadline).await;
    }
}

async fn run_loop(
    deps: WorkflowDeps,
    config: NormalizeConfig,
    mut input_rx: mpsc::UnboundedReceiver<String>,
    update_tx: mpsc::UnboundedSender<NormalizeUpdate>,
) {
    // Idle when None; debouncing when Some. Input events arriving while a
    // submission is in flight queue in the channel and start a fresh
    // debounce window afterwards.
    let mut pending: Option<(String, Instant)> = None;

    loop {
        let deadline = pending.as_ref().map(|(_, at)| *at);

        tokio::select! {
            event = input_rx.recv() => {
                match event {
                    Some(text) => {
                        // A new input cancels and restarts the pending timer.
                        pending = Some((text, Instant::now() + config.debounce));
                    }
                    None => break,
                }
            }
            _ = debounce_timer(deadline), if deadline.is_some() => {
                if let Some((text, _)) = pending.take() {
                    tracing::debug!(chars = text.len(), "Debounce elapsed, submitting");
                    let _ = update_tx.send(NormalizeUpdate::Submitted { text: text.clone() });
                    submit(&deps, &config, &text, &update_tx).await;
                }
            }
        }
    }

    tracing::debug!("Normalization session closed");
}

/// Run one submission through the pipeline, emitting an update per step.
async fn submit(
    deps: &WorkflowDeps,
    config: &NormalizeConfig,
    text: &str,
    updates: &mpsc::UnboundedSender<NormalizeUpdate>,
) {
    let fail = |stage: NormalizeStage, message: String| {
        tracing::warn!(%stage, %message, "Submission step failed");
        NormalizeUpdate::Failed { stage, message }
    };

    let embedding = deps.embedder.embed(text).await;
    if embedding.is_empty() {
        let _ = updates.send(fail(
            NormalizeStage::InputEmbedding,
            "no embedding available".to_string(),
        ));
        return;
    }
    if let Err(e) = deps.index.upsert(REFERENCE_ID, &embedding).await {
        let _ = updates.send(fail(NormalizeStage::StoreInput, e.to_string()));
        return;
    }
    let _ = updates.send(NormalizeUpdate::InputEmbedding(embedding));

    let generalized = match deps.generator.generate(&config.system_prompt, text).await {
        Ok(text) => text,
        Err(e) => {
            let _ = updates.send(fail(NormalizeStage::Generation, e.to_string()));
            return;
        }
    };
    let _ = updates.send(NormalizeUpdate::GeneralizedText(generalized.clone()));

    let generalized_embedding = deps.embedder.embed(&generalized).await;
    if generalized_embedding.is_empty() {
        let _ = updates.send(fail(
            NormalizeStage::GeneralizedEmbedding,
            "no embedding available".to_string(),
        ));
        return;
    }
    if let Err(e) = deps.index.upsert(COMPARISON_ID, &generalized_embedding).await {
        let _ = updates.send(fail(NormalizeStage::StoreGeneralized, e.to_string()));
        return;
    }
    let _ = updates.send(NormalizeUpdate::GeneralizedEmbedding(generalized_embedding));

    // The hosted index needs a moment before fresh vectors are queryable.
    tokio::time::sleep(config.settle).await;

    match deps.index.nearest_similarity().await {
        Ok(score) => {
            let _ = updates.send(NormalizeUpdate::Similarity(score));
        }
        Err(e) => {
            let _ = updates.send(fail(NormalizeStage::Similarity, e.to_string()));
        }
    }
}
