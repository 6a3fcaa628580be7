//! Mock Moonshot chat completion server
//!
//! Replies are scripted per test and served in order; every request body is
//! recorded for later assertions

use std::collections::VecDeque;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Key the mock accepts as bearer token
pub const API_KEY: &str = "sk-mock";

/// One scripted reply
pub enum Reply {
    /// JSON chat completion body
    Completion(Value),
    /// Server-sent events, one `data:` line per item, terminated by `[DONE]`
    Events(Vec<String>),
    /// Error status with an API error body
    Error(StatusCode, &'static str),
}

impl Reply {
    /// Stream of chunk objects
    pub fn chunks(chunks: impl IntoIterator<Item = Value>) -> Self {
        Self::Events(chunks.into_iter().map(|chunk| chunk.to_string()).collect())
    }
}

/// Mock server bound to an ephemeral local port
pub struct MockMoonshot {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Value>>,
}

impl MockMoonshot {
    /// Start the mock server, returning once it accepts connections
    pub async fn start(replies: impl IntoIterator<Item = Reply>) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::default(),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL to point the transport at
    pub fn base_url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockMoonshot {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_chat_completions(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {API_KEY}"));
    if !authorized {
        return error(StatusCode::UNAUTHORIZED, "invalid api key");
    }

    state.requests.lock().unwrap().push(body);

    let reply = state.replies.lock().unwrap().pop_front();
    match reply {
        Some(Reply::Completion(completion)) => Json(completion).into_response(),
        Some(Reply::Events(events)) => {
            let mut sse = String::new();
            for event in events {
                write!(sse, "data: {event}\n\n").unwrap();
            }
            sse.push_str("data: [DONE]\n\n");
            (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
        }
        Some(Reply::Error(status, message)) => error(status, message),
        None => error(StatusCode::INTERNAL_SERVER_ERROR, "no scripted reply left"),
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"error": {"message": message, "type": "mock_error"}})),
    )
        .into_response()
}

/// Non-streamed completion with a single text choice
pub fn text_completion(text: &str, usage: (u64, u64, u64)) -> Value {
    completion(
        json!({"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}),
        usage,
    )
}

/// Non-streamed completion asking for one tool call
pub fn tool_call_completion(call_id: &str, name: &str, arguments: &str, usage: (u64, u64, u64)) -> Value {
    completion(
        json!({
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{
                    "id": call_id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                }]
            },
            "finish_reason": "tool_calls"
        }),
        usage,
    )
}

fn completion(choice: Value, (prompt, completion, total): (u64, u64, u64)) -> Value {
    json!({
        "id": "cmpl-mock",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "moonshot-v1-8k",
        "choices": [choice],
        "usage": {"prompt_tokens": prompt, "completion_tokens": completion, "total_tokens": total}
    })
}

/// Streamed chunk carrying one choice
///
/// Moonshot reports usage on the finishing choice rather than on the chunk.
pub fn chunk(id: &str, delta: Value, finish_reason: Option<&str>, usage: Option<(u64, u64, u64)>) -> Value {
    let mut choice = json!({"index": 0, "delta": delta, "finish_reason": finish_reason});
    if let Some((prompt, completion, total)) = usage {
        choice["usage"] = json!({"prompt_tokens": prompt, "completion_tokens": completion, "total_tokens": total});
    }

    json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": "moonshot-v1-8k",
        "choices": [choice]
    })
}

/// Chunks streaming `words` as separate deltas, then finishing with `usage`
pub fn text_chunks(id: &str, words: &[&str], usage: (u64, u64, u64)) -> Vec<Value> {
    let mut chunks = vec![chunk(id, json!({"role": "assistant", "content": ""}), None, None)];
    chunks.extend(words.iter().map(|word| chunk(id, json!({"content": word}), None, None)));
    chunks.push(chunk(id, json!({}), Some("stop"), Some(usage)));
    chunks
}
