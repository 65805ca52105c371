//! Workflow integration tests
//!
//! These tests drive the comparison and normalization workflows end to
//! end over the public provider mocks, checking that the pieces compose:
//! embeddings flow into the index, similarity scores come back out, and
//! heatmaps render from workflow results.

use std::sync::Arc;
use std::time::Duration;

use semascope_engine::{
    COMPARISON_ID, ColorMode, Embedding, Heatmap, HeatmapOptions, MockEmbedder, MockGenerator,
    MockIndex, NormalizeConfig, NormalizeSession, NormalizeUpdate, REFERENCE_ID, SharedEmbedder,
    SharedVectorIndex, VisualizeConfig, Visualizer, WorkflowDeps,
};

fn build_deps(
    embedder: MockEmbedder,
    generator: MockGenerator,
    index: MockIndex,
) -> (WorkflowDeps, Arc<MockEmbedder>, Arc<MockIndex>) {
    let embedder = Arc::new(embedder);
    let index = Arc::new(index);
    let deps = WorkflowDeps::new(
        Arc::clone(&embedder) as SharedEmbedder,
        Arc::new(generator),
        Arc::clone(&index) as SharedVectorIndex,
    );
    (deps, embedder, index)
}

#[tokio::test(start_paused = true)]
async fn test_compare_end_to_end_with_heatmaps() {
    let embedder = MockEmbedder::new(6);
    embedder.push_response(Embedding::new(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
    embedder.push_response(Embedding::new(vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0]));
    let (deps, _, index) = build_deps(embedder, MockGenerator::new(vec![]), MockIndex::new());

    let visualizer = Visualizer::new(deps)
        .with_config(VisualizeConfig::new().with_settle(Duration::from_millis(50)));
    let comparison = visualizer.compare("first text", "second text").await.unwrap();

    // Orthogonal vectors score zero.
    assert!(comparison.similarity.abs() < 1e-5);

    // Both embeddings survived and render into grids of the right shape.
    let options = HeatmapOptions::new()
        .with_columns(3)
        .with_mode(ColorMode::Spectrum);
    let left = Heatmap::render(&comparison.left, &options).unwrap();
    let right = Heatmap::render(&comparison.right, &options).unwrap();
    assert_eq!(left.cells().len(), 6);
    assert_eq!(left.rows(), 2);
    assert_eq!(right.cells().len(), 6);

    // The index holds both slots.
    assert!(index.record(REFERENCE_ID).is_some());
    assert!(index.record(COMPARISON_ID).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_compare_twice_keeps_latest_vectors() {
    let embedder = MockEmbedder::new(4);
    embedder.push_response(Embedding::new(vec![1.0, 0.0, 0.0, 0.0]));
    embedder.push_response(Embedding::new(vec![0.0, 1.0, 0.0, 0.0]));
    embedder.push_response(Embedding::new(vec![0.0, 0.0, 1.0, 0.0]));
    embedder.push_response(Embedding::new(vec![0.0, 0.0, 0.0, 1.0]));
    let (deps, _, index) = build_deps(embedder, MockGenerator::new(vec![]), MockIndex::new());

    let visualizer =
        Visualizer::new(deps).with_config(VisualizeConfig::new().with_settle(Duration::ZERO));

    visualizer.compare("a", "b").await.unwrap();
    visualizer.compare("c", "d").await.unwrap();

    // Upserting the same identifiers again replaced the earlier vectors.
    assert_eq!(
        index.record(REFERENCE_ID).unwrap().values(),
        &[0.0, 0.0, 1.0, 0.0]
    );
    assert_eq!(
        index.record(COMPARISON_ID).unwrap().values(),
        &[0.0, 0.0, 0.0, 1.0]
    );
    assert_eq!(index.upsert_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_normalize_session_full_cycle() {
    let (deps, embedder, index) = build_deps(
        MockEmbedder::new(8),
        MockGenerator::with_text("a general idea"),
        MockIndex::new(),
    );

    let config = NormalizeConfig::new()
        .with_system_prompt("restate generally")
        .with_debounce(Duration::from_millis(2000))
        .with_settle(Duration::from_millis(100));
    let (handle, mut updates) = NormalizeSession::spawn(deps, config);

    handle.input("a very specific idea");

    let mut seen = Vec::new();
    while let Some(update) = updates.recv().await {
        let done = matches!(update, NormalizeUpdate::Similarity(_));
        seen.push(update);
        if done {
            break;
        }
    }

    assert_eq!(seen.len(), 5);
    assert!(matches!(
        &seen[0],
        NormalizeUpdate::Submitted { text } if text == "a very specific idea"
    ));
    assert!(matches!(
        &seen[2],
        NormalizeUpdate::GeneralizedText(text) if text == "a general idea"
    ));

    // Both pipeline embeddings were stored under their slots.
    assert_eq!(index.upserted_ids(), vec![REFERENCE_ID, COMPARISON_ID]);
    assert_eq!(
        embedder.requests(),
        vec![
            "a very specific idea".to_string(),
            "a general idea".to_string()
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_normalize_failure_then_recovery() {
    // A generator with a single response: the first submission consumes
    // it, the second submission fails at the generation step.
    let (deps, _, _) = build_deps(
        MockEmbedder::new(8),
        MockGenerator::with_text("only one"),
        MockIndex::new(),
    );

    let config = NormalizeConfig::new()
        .with_debounce(Duration::from_millis(100))
        .with_settle(Duration::ZERO);
    let (handle, mut updates) = NormalizeSession::spawn(deps, config);

    handle.input("first");
    let mut first = Vec::new();
    while let Some(update) = updates.recv().await {
        let done = matches!(
            update,
            NormalizeUpdate::Similarity(_) | NormalizeUpdate::Failed { .. }
        );
        first.push(update);
        if done {
            break;
        }
    }
    assert!(matches!(first.last(), Some(NormalizeUpdate::Similarity(_))));

    handle.input("second");
    let mut second = Vec::new();
    while let Some(update) = updates.recv().await {
        let done = matches!(
            update,
            NormalizeUpdate::Similarity(_) | NormalizeUpdate::Failed { .. }
        );
        second.push(update);
        if done {
            break;
        }
    }

    // The failure is a message, not a crash; earlier updates for the
    // submission still arrived.
    assert!(matches!(second[0], NormalizeUpdate::Submitted { .. }));
    assert!(matches!(second[1], NormalizeUpdate::InputEmbedding(_)));
    assert!(matches!(
        second.last(),
        Some(NormalizeUpdate::Failed { message, .. }) if !message.is_empty()
    ));
}

#[tokio::test(start_paused = true)]
async fn test_similarity_matches_cosine_of_stored_vectors() {
    let embedder = MockEmbedder::new(3);
    embedder.push_response(Embedding::new(vec![1.0, 1.0, 0.0]));
    embedder.push_response(Embedding::new(vec![1.0, 0.0, 0.0]));
    let (deps, _, _) = build_deps(embedder, MockGenerator::new(vec![]), MockIndex::new());

    let visualizer =
        Visualizer::new(deps).with_config(VisualizeConfig::new().with_settle(Duration::ZERO));
    let comparison = visualizer.compare("x", "y").await.unwrap();

    // cos(45°) between the stored pair.
    assert!((comparison.similarity - 0.7071).abs() < 1e-3);
}
