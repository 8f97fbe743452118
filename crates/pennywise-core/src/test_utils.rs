//! Test utilities for pennywise-core
//!
//! Provides a mock Gemini server that speaks just enough of the
//! `generateContent` API for backend and integration tests.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// What the mock server answers with
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A normal completion with this text
    Text(String),
    /// A prompt blocked by the safety filter with this reason
    Blocked(String),
    /// An API error with this status and message
    Status(u16, String),
    /// A completion delivered after a delay
    Slow(Duration, String),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

struct MockState {
    default: MockReply,
    script: Mutex<VecDeque<MockReply>>,
    calls: AtomicUsize,
    last_request: Mutex<Option<Value>>,
    last_api_key: Mutex<Option<String>>,
}

/// Mock Gemini server for testing and development
pub struct MockGeminiServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockGeminiServer {
    /// Start the mock server on an available port, answering every call with `reply`
    pub async fn start(reply: MockReply) -> Self {
        Self::start_scripted(Vec::new(), reply).await
    }

    /// Answer with `script` in order, then with `default`
    pub async fn start_scripted(script: Vec<MockReply>, default: MockReply) -> Self {
        let state = Arc::new(MockState {
            default,
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            last_api_key: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1beta/*path", get(handle_model).post(handle_generate))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL to use as `GEMINI_BASE_URL`
    pub fn url(&self) -> String {
        format!("http://{}/v1beta", self.addr)
    }

    /// Number of generateContent calls received
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Body of the most recent generateContent call
    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }

    /// `x-goog-api-key` header of the most recent call
    pub fn last_api_key(&self) -> Option<String> {
        self.state.last_api_key.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockGeminiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Model metadata endpoint (health check)
async fn handle_model() -> Json<Value> {
    Json(json!({
        "name": "models/gemini-1.5-flash",
        "displayName": "Gemini 1.5 Flash"
    }))
}

async fn handle_generate(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    *state.last_request.lock().unwrap() = Some(body);
    *state.last_api_key.lock().unwrap() = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let reply = state
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| state.default.clone());

    match reply {
        MockReply::Text(text) => Json(completion(&text)).into_response(),
        MockReply::Slow(delay, text) => {
            tokio::time::sleep(delay).await;
            Json(completion(&text)).into_response()
        }
        MockReply::Blocked(reason) => Json(json!({
            "promptFeedback": {"blockReason": reason}
        }))
        .into_response(),
        MockReply::Status(code, message) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                Json(json!({
                    "error": {"code": code, "message": message, "status": "ERROR"}
                })),
            )
                .into_response()
        }
    }
}

fn completion(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_scripted_then_default() {
        let server = MockGeminiServer::start_scripted(
            vec![MockReply::text("first")],
            MockReply::text("default"),
        )
        .await;
        let client = reqwest::Client::new();
        let url = format!("{}/models/gemini-1.5-flash:generateContent", server.url());

        for expected in ["first", "default"] {
            let body: Value = client
                .post(&url)
                .json(&json!({"contents": []}))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(body["candidates"][0]["content"]["parts"][0]["text"], expected);
        }
        assert_eq!(server.calls(), 2);
    }
}
