use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use llm_local::client::LlmClient;
use llm_local::config::LlmConfig;
use llm_local::server::router;

#[derive(Clone)]
struct StubState {
    model: String,
    reply: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn stub_tags(State(state): State<StubState>) -> Json<Value> {
    Json(json!({ "models": [{ "name": state.model }] }))
}

async fn stub_chat(State(state): State<StubState>, Json(body): Json<Value>) -> Json<Value> {
    state.requests.lock().unwrap().push(body);
    Json(json!({ "message": { "role": "assistant", "content": state.reply } }))
}

/// Ollama stand-in on an ephemeral port. Returns its base URL and the
/// recorded `/api/chat` request bodies.
async fn spawn_stub(reply: &str) -> (String, Arc<Mutex<Vec<Value>>>) {
    let requests: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        model: "stub-model:latest".to_string(),
        reply: reply.to_string(),
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/api/tags", get(stub_tags))
        .route("/api/chat", post(stub_chat))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), requests)
}

/// The facade under test, backed by `backend_url`.
async fn spawn_facade(backend_url: &str) -> String {
    let config = LlmConfig {
        model: "stub-model:latest".to_string(),
        base_url: backend_url.to_string(),
        timeout_secs: 5,
        ..LlmConfig::default()
    };
    let client = LlmClient::new(config).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(client)).await.unwrap();
    });
    format!("http://{addr}")
}

/// A URL nothing listens on: bound once, then dropped.
async fn dead_backend_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_ok_with_backend() {
    let (backend, _) = spawn_stub("unused").await;
    let api = spawn_facade(&backend).await;

    let resp = reqwest::get(format!("{api}/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"], "stub-model:latest");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_unavailable_without_backend() {
    let api = spawn_facade(&dead_backend_url().await).await;

    let resp = reqwest::get(format!("{api}/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_health_check_does_not_stall_generate() {
    // A backend that answers the availability check slowly and chat
    // instantly. Generation must not queue behind the in-flight check.
    async fn slow_tags() -> Json<Value> {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        Json(json!({ "models": [{ "name": "stub-model:latest" }] }))
    }
    async fn instant_chat() -> Json<Value> {
        Json(json!({ "message": { "role": "assistant", "content": "fast reply" } }))
    }
    let app = Router::new()
        .route("/api/tags", get(slow_tags))
        .route("/api/chat", post(instant_chat));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let api = spawn_facade(&backend).await;

    let health = tokio::spawn(reqwest::get(format!("{api}/health")));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let request = reqwest::Client::new()
        .post(format!("{api}/generate"))
        .json(&json!({ "prompt": "hi" }));
    let resp = tokio::time::timeout(Duration::from_millis(750), request.send())
        .await
        .expect("generate must answer while a health check is in flight")
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["response"], "fast reply");

    let resp = health.await.unwrap().unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn models_lists_backend_models() {
    let (backend, _) = spawn_stub("unused").await;
    let api = spawn_facade(&backend).await;

    let resp = reqwest::get(format!("{api}/models")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["models"], json!(["stub-model:latest"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_returns_reply_and_forwards_prompt() {
    let (backend, requests) = spawn_stub("generated text").await;
    let api = spawn_facade(&backend).await;

    let resp = reqwest::Client::new()
        .post(format!("{api}/generate"))
        .json(&json!({ "prompt": "say hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["response"], "generated text");

    let recorded = requests.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0]["model"], "stub-model:latest");
    assert_eq!(recorded[0]["stream"], false);
    let messages = recorded[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "say hello");
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_with_system_prepends_system_message() {
    let (backend, requests) = spawn_stub("ok").await;
    let api = spawn_facade(&backend).await;

    reqwest::Client::new()
        .post(format!("{api}/generate"))
        .json(&json!({ "prompt": "hi", "system": "be terse" }))
        .send()
        .await
        .unwrap();

    let recorded = requests.lock().unwrap();
    let messages = recorded[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], "be terse");
    assert_eq!(messages[1]["role"], "user");
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_empty_prompt_is_bad_request() {
    let (backend, _) = spawn_stub("unused").await;
    let api = spawn_facade(&backend).await;

    let resp = reqwest::Client::new()
        .post(format!("{api}/generate"))
        .json(&json!({ "prompt": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "prompt must not be empty");
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_completes_an_explicit_transcript() {
    let (backend, requests) = spawn_stub("four").await;
    let api = spawn_facade(&backend).await;

    let resp = reqwest::Client::new()
        .post(format!("{api}/chat"))
        .json(&json!({
            "messages": [
                { "role": "user", "content": "one" },
                { "role": "assistant", "content": "two" },
                { "role": "user", "content": "three" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["response"], "four");

    let recorded = requests.lock().unwrap();
    assert_eq!(recorded[0]["messages"].as_array().unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_empty_messages_is_bad_request() {
    let (backend, _) = spawn_stub("unused").await;
    let api = spawn_facade(&backend).await;

    let resp = reqwest::Client::new()
        .post(format!("{api}/chat"))
        .json(&json!({ "messages": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_send_without_session_is_conflict() {
    let (backend, _) = spawn_stub("unused").await;
    let api = spawn_facade(&backend).await;

    let resp = reqwest::Client::new()
        .post(format!("{api}/chat/send"))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "no_session");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no active chat session"));
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_history_without_session_is_conflict() {
    let (backend, _) = spawn_stub("unused").await;
    let api = spawn_facade(&backend).await;

    let resp = reqwest::get(format!("{api}/chat/history")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "no_session");
}

#[tokio::test(flavor = "multi_thread")]
async fn session_flow_accumulates_history() {
    let (backend, requests) = spawn_stub("stub reply").await;
    let api = spawn_facade(&backend).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{api}/chat/start"))
        .json(&json!({ "system_prompt": "You are terse." }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["started"], true);

    for message in ["first question", "second question"] {
        let resp = http
            .post(format!("{api}/chat/send"))
            .json(&json!({ "message": message }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["response"], "stub reply");
    }

    // The second send replayed the whole transcript to the backend.
    {
        let recorded = requests.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0]["messages"].as_array().unwrap().len(), 2);
        assert_eq!(recorded[1]["messages"].as_array().unwrap().len(), 4);
    }

    let resp = reqwest::get(format!("{api}/chat/history")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let messages = body["messages"].as_array().unwrap();
    let roles: Vec<&str> = messages
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(
        roles,
        vec!["system", "user", "assistant", "user", "assistant"]
    );
    assert_eq!(messages[0]["content"], "You are terse.");
    assert_eq!(messages[3]["content"], "second question");
}

#[tokio::test(flavor = "multi_thread")]
async fn stateless_chat_does_not_touch_the_session() {
    let (backend, _) = spawn_stub("reply").await;
    let api = spawn_facade(&backend).await;

    let resp = reqwest::Client::new()
        .post(format!("{api}/chat"))
        .json(&json!({ "messages": [{ "role": "user", "content": "hi" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = reqwest::get(format!("{api}/chat/history")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test(flavor = "multi_thread")]
async fn reset_clears_the_session() {
    let (backend, _) = spawn_stub("unused").await;
    let api = spawn_facade(&backend).await;
    let http = reqwest::Client::new();

    http.post(format!("{api}/chat/start"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    let resp = http
        .post(format!("{api}/chat/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reset"], true);

    let resp = reqwest::get(format!("{api}/chat/history")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_failure_maps_to_backend_error() {
    // A backend whose chat endpoint always fails.
    async fn failing_chat() -> (StatusCode, &'static str) {
        (StatusCode::INTERNAL_SERVER_ERROR, "model exploded")
    }
    let app = Router::new().route("/api/chat", post(failing_chat));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let api = spawn_facade(&backend).await;
    let resp = reqwest::Client::new()
        .post(format!("{api}/generate"))
        .json(&json!({ "prompt": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "backend_error");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("model exploded"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_backend_maps_to_backend_unavailable() {
    let api = spawn_facade(&dead_backend_url().await).await;

    let resp = reqwest::Client::new()
        .post(format!("{api}/generate"))
        .json(&json!({ "prompt": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "backend_unavailable");
}
