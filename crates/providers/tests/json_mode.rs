//! JSON-mode contract tests against a scripted in-process upstream.
//!
//! A minimal axum server plays the chat-completions endpoint so the full
//! recovery ladder (fallback, length retry, repair call) is exercised
//! over real HTTP without any external service.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use cp_providers::{ChatModel, ChatParams, OpenAiCompatClient};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted upstream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Upstream {
    responses: Mutex<VecDeque<(StatusCode, Value)>>,
    requests: Mutex<Vec<Value>>,
}

impl Upstream {
    fn completion(content: &str, finish_reason: &str) -> Value {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": finish_reason,
            }]
        })
    }
}

async fn completions(
    State(upstream): State<Arc<Upstream>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    upstream.requests.lock().push(body);
    let (status, value) = upstream
        .responses
        .lock()
        .pop_front()
        .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "script exhausted"})));
    (status, Json(value))
}

/// Spawn the scripted upstream, returning its handle and base URL.
async fn spawn_upstream(script: Vec<(StatusCode, Value)>) -> (Arc<Upstream>, String) {
    let upstream = Arc::new(Upstream {
        responses: Mutex::new(script.into()),
        requests: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/chat/completions", post(completions))
        .with_state(upstream.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (upstream, format!("http://{addr}"))
}

fn client(base_url: &str, allow_plain_fallback: bool) -> OpenAiCompatClient {
    OpenAiCompatClient::new(
        base_url,
        "test-key",
        "test-model",
        Duration::from_secs(5),
        allow_plain_fallback,
    )
    .unwrap()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parse recovery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn fenced_json_parses_without_extra_calls() {
    let (upstream, url) = spawn_upstream(vec![(
        StatusCode::OK,
        Upstream::completion("```json\n{\"intent\": \"marketing\"}\n```", "stop"),
    )])
    .await;

    let value = client(&url, false)
        .chat_json("sys", "user", ChatParams::default())
        .await
        .unwrap();

    assert_eq!(value["intent"], "marketing");
    assert_eq!(upstream.requests.lock().len(), 1);
}

#[tokio::test]
async fn garbage_is_repaired_once_then_succeeds() {
    let (upstream, url) = spawn_upstream(vec![
        (StatusCode::OK, Upstream::completion("definitely not json", "stop")),
        (StatusCode::OK, Upstream::completion("{\"fixed\": true}", "stop")),
    ])
    .await;

    let value = client(&url, false)
        .chat_json("sys", "user", ChatParams::default())
        .await
        .unwrap();

    assert_eq!(value["fixed"], true);
    let requests = upstream.requests.lock();
    assert_eq!(requests.len(), 2);
    // The repair call keeps JSON mode and echoes the broken output.
    assert_eq!(requests[1]["response_format"]["type"], "json_object");
    let repair_user = requests[1]["messages"][1]["content"].as_str().unwrap();
    assert!(repair_user.contains("definitely not json"));
}

#[tokio::test]
async fn unrepairable_garbage_errors_after_exactly_one_repair_attempt() {
    let (upstream, url) = spawn_upstream(vec![
        (StatusCode::OK, Upstream::completion("garbage one", "stop")),
        (StatusCode::OK, Upstream::completion("garbage two", "stop")),
    ])
    .await;

    let err = client(&url, false)
        .chat_json("sys", "user", ChatParams::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("JSON parse failed"), "{err}");
    assert_eq!(upstream.requests.lock().len(), 2);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Length truncation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn length_truncation_retries_with_doubled_budget() {
    let (upstream, url) = spawn_upstream(vec![
        (StatusCode::OK, Upstream::completion("{\"partial\":", "length")),
        (StatusCode::OK, Upstream::completion("{\"complete\": true}", "stop")),
    ])
    .await;

    let value = client(&url, false)
        .chat_json("sys", "user", ChatParams::default())
        .await
        .unwrap();

    assert_eq!(value["complete"], true);
    let requests = upstream.requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["max_tokens"], 1400);
    assert_eq!(requests[1]["max_tokens"], 2800);
    assert_eq!(requests[1]["temperature"], 0.0);
    let retry_user = requests[1]["messages"][1]["content"].as_str().unwrap();
    assert!(retry_user.contains("길이 제한"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON-mode rejection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn json_mode_rejection_is_a_descriptive_error_by_default() {
    let (upstream, url) = spawn_upstream(vec![(
        StatusCode::BAD_REQUEST,
        json!({"error": {"message": "response_format is not supported"}}),
    )])
    .await;

    let err = client(&url, false)
        .chat_json("sys", "user", ChatParams::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("JSON mode rejected"), "{err}");
    assert_eq!(upstream.requests.lock().len(), 1);
}

#[tokio::test]
async fn json_mode_rejection_falls_back_to_plain_when_opted_in() {
    let (upstream, url) = spawn_upstream(vec![
        (
            StatusCode::BAD_REQUEST,
            json!({"error": {"message": "response_format is not supported"}}),
        ),
        (StatusCode::OK, Upstream::completion("{\"plain\": true}", "stop")),
    ])
    .await;

    let value = client(&url, true)
        .chat_json("sys", "user", ChatParams::default())
        .await
        .unwrap();

    assert_eq!(value["plain"], true);
    let requests = upstream.requests.lock();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].get("response_format").is_some());
    assert!(requests[1].get("response_format").is_none());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Plain text
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn chat_text_returns_trimmed_content() {
    let (_upstream, url) = spawn_upstream(vec![(
        StatusCode::OK,
        Upstream::completion("  위약금 해지 절차  ", "stop"),
    )])
    .await;

    let text = client(&url, false)
        .chat_text("sys", "user", ChatParams::default())
        .await
        .unwrap();

    assert_eq!(text, "위약금 해지 절차");
}
