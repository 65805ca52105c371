//! HTTP mock server for integration testing.
//!
//! Provides an HTTP server that mimics the embedding, chat-completion,
//! and vector-index endpoints for testing the full request/response cycle
//! without real API calls.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::provider::cosine_similarity;
use crate::testing::fixtures;

/// A request captured by the mock server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request path.
    pub path: String,
    /// Parsed JSON body.
    pub body: serde_json::Value,
}

#[derive(Default)]
struct ServerState {
    /// Queued bodies for the embeddings endpoint.
    embeddings: Mutex<VecDeque<serde_json::Value>>,
    /// Queued bodies for the chat endpoint.
    chats: Mutex<VecDeque<serde_json::Value>>,
    /// In-memory vector map backing the index endpoints.
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    /// All requests, in arrival order.
    requests: Mutex<Vec<CapturedRequest>>,
}

impl ServerState {
    fn capture(&self, path: &str, body: &serde_json::Value) {
        self.requests.lock().unwrap().push(CapturedRequest {
            path: path.to_string(),
            body: body.clone(),
        });
    }
}

/// An HTTP mock for all three provider endpoints.
///
/// Embedding and chat responses are queued explicitly; the index
/// endpoints are backed by an in-memory vector map with cosine scoring,
/// so upsert-then-query flows behave like a tiny real index.
///
/// # Example
///
/// ```ignore
/// use semascope_engine::testing::MockProviderServer;
///
/// let server = MockProviderServer::start().await;
/// server.queue_embedding(&[0.25, 0.5]);
///
/// // Point a client at server.url() and exercise it.
///
/// server.shutdown().await;
/// ```
pub struct MockProviderServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockProviderServer {
    /// Start a new mock server on a random available port.
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let state_clone = Arc::clone(&state);

        let app = Router::new()
            .route("/v1/embeddings", post(handle_embeddings))
            .route("/v1/chat/completions", post(handle_chat))
            .route("/vectors/upsert", post(handle_upsert))
            .route("/query", post(handle_query))
            .with_state(state_clone);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Failed to get local address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        // Give the server a moment to start
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Get the server's base URL.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue an embedding response with the given values.
    pub fn queue_embedding(&self, values: &[f32]) {
        self.queue_raw_embedding(fixtures::embedding_body(values));
    }

    /// Queue a raw embedding body (for malformed-response tests).
    pub fn queue_raw_embedding(&self, body: serde_json::Value) {
        self.state.embeddings.lock().unwrap().push_back(body);
    }

    /// Queue a chat completion response with the given content.
    pub fn queue_chat(&self, content: &str) {
        self.state
            .chats
            .lock()
            .unwrap()
            .push_back(fixtures::chat_body(content));
    }

    /// The vector currently stored under an identifier.
    pub fn stored_vector(&self, id: &str) -> Option<Vec<f32>> {
        self.state.vectors.lock().unwrap().get(id).cloned()
    }

    /// Get captured requests.
    pub fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    /// Shutdown the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Handle POST /v1/embeddings
async fn handle_embeddings(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.capture("/v1/embeddings", &body);

    match state.embeddings.lock().unwrap().pop_front() {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => {
            let error = serde_json::json!({"detail": "no more embedding responses queued"});
            (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
        }
    }
}

/// Handle POST /v1/chat/completions
async fn handle_chat(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.capture("/v1/chat/completions", &body);

    match state.chats.lock().unwrap().pop_front() {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => {
            let error = serde_json::json!({
                "error": {"type": "server_error", "message": "no more chat responses queued"}
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
        }
    }
}

/// Handle POST /vectors/upsert
async fn handle_upsert(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.capture("/vectors/upsert", &body);

    let records = body
        .get("vectors")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let mut vectors = state.vectors.lock().unwrap();
    let mut count = 0;
    for record in records {
        let id = record.get("id").and_then(|v| v.as_str());
        let values = record
            .get("values")
            .map(|v| serde_json::from_value::<Vec<f32>>(v.clone()));
        if let (Some(id), Some(Ok(values))) = (id, values) {
            vectors.insert(id.to_string(), values);
            count += 1;
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"upsertedCount": count})),
    )
        .into_response()
}

/// Handle POST /query
///
/// Queries by id return that record; queries by vector rank all stored
/// records by cosine similarity, truncated to topK.
async fn handle_query(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.capture("/query", &body);

    let vectors = state.vectors.lock().unwrap();
    let include_values = body
        .get("includeValues")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let matches: Vec<serde_json::Value> = if let Some(id) = body.get("id").and_then(|v| v.as_str())
    {
        match vectors.get(id) {
            Some(values) => vec![query_match(id, 1.0, Some(values))],
            None => vec![],
        }
    } else if let Some(vector) = body.get("vector") {
        let query: Vec<f32> = serde_json::from_value(vector.clone()).unwrap_or_default();
        let top_k = body.get("topK").and_then(|v| v.as_u64()).unwrap_or(1) as usize;

        let mut scored: Vec<(String, f32)> = vectors
            .iter()
            .map(|(id, values)| (id.clone(), cosine_similarity(&query, values)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(id, score)| {
                let values = include_values.then(|| vectors[&id].clone());
                query_match(&id, score, values.as_ref())
            })
            .collect()
    } else {
        let error = serde_json::json!({"message": "query requires an id or a vector"});
        return (StatusCode::BAD_REQUEST, Json(error)).into_response();
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"matches": matches, "namespace": "default"})),
    )
        .into_response()
}

fn query_match(id: &str, score: f32, values: Option<&Vec<f32>>) -> serde_json::Value {
    match values {
        Some(values) => serde_json::json!({"id": id, "score": score, "values": values}),
        None => serde_json::json!({"id": id, "score": score}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let server = MockProviderServer::start().await;
        assert!(server.url().starts_with("http://127.0.0.1:"));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_queued_embedding_round_trip() {
        let server = MockProviderServer::start().await;
        server.queue_embedding(&[0.25, 0.5]);

        let client = reqwest::Client::new();
        let response: serde_json::Value = client
            .post(format!("{}/v1/embeddings", server.url()))
            .json(&serde_json::json!({"input": "hi", "model": "voyage-large-2"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(response["data"][0]["embedding"][1], 0.5);
        assert_eq!(server.request_count(), 1);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_exhausted_queue_is_server_error() {
        let server = MockProviderServer::start().await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("{}/v1/embeddings", server.url()))
            .json(&serde_json::json!({"input": "hi", "model": "m"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_upsert_then_query_by_id() {
        let server = MockProviderServer::start().await;

        let client = reqwest::Client::new();
        client
            .post(format!("{}/vectors/upsert", server.url()))
            .json(&serde_json::json!({
                "vectors": [{"id": "1", "values": [1.0, 0.0]}],
                "namespace": "default"
            }))
            .send()
            .await
            .unwrap();

        let response: serde_json::Value = client
            .post(format!("{}/query", server.url()))
            .json(&serde_json::json!({"id": "1", "topK": 1, "includeValues": true}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(response["matches"][0]["id"], "1");
        assert_eq!(response["matches"][0]["values"][0], 1.0);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_query_by_vector_ranks_by_cosine() {
        let server = MockProviderServer::start().await;

        let client = reqwest::Client::new();
        client
            .post(format!("{}/vectors/upsert", server.url()))
            .json(&serde_json::json!({
                "vectors": [
                    {"id": "1", "values": [1.0, 0.0]},
                    {"id": "2", "values": [0.0, 1.0]}
                ],
                "namespace": "default"
            }))
            .send()
            .await
            .unwrap();

        let response: serde_json::Value = client
            .post(format!("{}/query", server.url()))
            .json(&serde_json::json!({"vector": [1.0, 0.0], "topK": 2, "includeValues": false}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(response["matches"][0]["id"], "1");
        assert_eq!(response["matches"][0]["score"], 1.0);
        assert_eq!(response["matches"][1]["id"], "2");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_query_without_id_or_vector_is_rejected() {
        let server = MockProviderServer::start().await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("{}/query", server.url()))
            .json(&serde_json::json!({"topK": 1}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);

        server.shutdown().await;
    }
}
