//! JSON HTTP facade over the LLM client.
//!
//! Exposes generation, model listing, and the persistent chat session as a
//! small JSON API so editors, scripts, and dashboards can drive a local
//! backend without speaking Ollama's wire format themselves.
//!
//! One [`LlmClient`] is shared by every handler behind a `tokio::sync::Mutex`,
//! so the server holds a single conversation per process, same as the CLI
//! REPL. Requests serialize on that lock: a long-running generation delays
//! other calls rather than interleaving with them. `/health` is the
//! exception: it probes through its own session-less client handle and never
//! takes the lock, so monitoring stays responsive while a request is in
//! flight.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Backend probe; `200` when reachable, `503` when not |
//! | `GET`  | `/models` | List models installed on the backend |
//! | `POST` | `/generate` | One-shot completion: `{prompt, system?, temperature?, max_tokens?}` |
//! | `POST` | `/chat` | Stateless transcript completion: `{messages, temperature?, max_tokens?}` |
//! | `POST` | `/chat/start` | Start (or restart) the held session: `{system_prompt?}` |
//! | `POST` | `/chat/send` | One user turn against the held session: `{message}` |
//! | `GET`  | `/chat/history` | Full transcript of the held session |
//! | `POST` | `/chat/reset` | Drop the held session |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "no_session", "message": "no active chat session; call start_chat first" } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_session` (409),
//! `backend_unavailable` (502), `backend_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based clients
//! can call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::client::{GenerateOptions, LlmClient};
use crate::config::Config;
use crate::error::LlmError;
use crate::models::Message;

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
struct AppState {
    /// The one client all handlers share. The mutex is the external
    /// synchronization the chat-session API requires.
    client: Arc<Mutex<LlmClient>>,
    /// Session-less clone reserved for `/health`, so the availability check
    /// never waits behind the lock while a generation runs.
    probe: Arc<LlmClient>,
}

/// Starts the HTTP facade.
///
/// Builds a client from `[llm]`, binds to the address in `[server].bind`,
/// and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let client = LlmClient::new(config.llm.clone())?;

    println!("API server listening on http://{}", bind_addr);
    println!(
        "Backing model: {} via {}",
        config.llm.model, config.llm.base_url
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router(client)).await?;

    Ok(())
}

/// Builds the router with all routes, CORS, and shared state.
///
/// Split out from [`run_server`] so tests and embedding binaries can serve
/// the API on a listener they control.
pub fn router(client: LlmClient) -> Router {
    let state = AppState {
        probe: Arc::new(client.clone()),
        client: Arc::new(Mutex::new(client)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/models", get(handle_models))
        .route("/generate", post(handle_generate))
        .route("/chat", post(handle_chat))
        .route("/chat/start", post(handle_chat_start))
        .route("/chat/send", post(handle_chat_send))
        .route("/chat/history", get(handle_chat_history))
        .route("/chat/reset", post(handle_chat_reset))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body shared by every endpoint.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"no_session"`, `"backend_error"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error for payload validation failures.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Maps client errors onto the HTTP contract so handlers can use `?`.
///
/// Transport failures and backend-side errors both read as 502: the facade
/// itself is healthy, the thing behind it is not. A chat call without a
/// session is a conflict with the server's current state, hence 409.
impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        let message = err.to_string();
        let (status, code) = match err {
            LlmError::BackendUnavailable(_) => (StatusCode::BAD_GATEWAY, "backend_unavailable"),
            LlmError::Backend(_) => (StatusCode::BAD_GATEWAY, "backend_error"),
            LlmError::NoActiveSession => (StatusCode::CONFLICT, "no_session"),
            LlmError::Config(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            LlmError::Io { .. } | LlmError::SummarizationFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code,
            message,
        }
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// `"ok"` when the backend answers the probe, `"unavailable"` otherwise.
    status: String,
    /// The model the server is configured to use.
    model: String,
}

/// Handler for `GET /health`.
///
/// Probes the backend and reports 200 or 503. Load balancers and monitoring
/// can use this to tell "facade up, backend down" apart from "facade down".
/// Runs on [`AppState::probe`], not the shared lock: with the backend down
/// the probe blocks for the connect timeout, and holding the lock that long
/// would stall every other endpoint.
async fn handle_health(State(state): State<AppState>) -> Response {
    let model = state.probe.config().model.clone();
    if state.probe.is_backend_available().await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                model,
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable".to_string(),
                model,
            }),
        )
            .into_response()
    }
}

// ============ GET /models ============

/// JSON response body for `GET /models`.
#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<String>,
}

/// Handler for `GET /models`. Lists the models installed on the backend.
async fn handle_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, AppError> {
    let client = state.client.lock().await;
    let models = client.list_models().await?;
    Ok(Json(ModelsResponse { models }))
}

// ============ POST /generate ============

/// JSON request body for `POST /generate`.
#[derive(Deserialize)]
struct GenerateRequest {
    prompt: String,
    system: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

/// JSON response body shared by the generation endpoints.
#[derive(Serialize)]
struct GenerateResponse {
    response: String,
}

/// Handler for `POST /generate`. One-shot completion, no session involved.
async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(bad_request("prompt must not be empty"));
    }
    let opts = GenerateOptions {
        system: req.system,
        temperature: req.temperature,
        max_tokens: req.max_tokens,
    };
    let client = state.client.lock().await;
    let response = client.generate(&req.prompt, &opts).await?;
    Ok(Json(GenerateResponse { response }))
}

// ============ POST /chat ============

/// JSON request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<Message>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

/// Handler for `POST /chat`.
///
/// Completes an explicit transcript supplied by the caller. The held chat
/// session is never read or written; callers that want server-side history
/// use the `/chat/start` family instead.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    if req.messages.is_empty() {
        return Err(bad_request("messages must not be empty"));
    }
    let opts = GenerateOptions {
        system: None,
        temperature: req.temperature,
        max_tokens: req.max_tokens,
    };
    let client = state.client.lock().await;
    let response = client.chat_completion(&req.messages, &opts).await?;
    Ok(Json(GenerateResponse { response }))
}

// ============ POST /chat/start ============

/// JSON request body for `POST /chat/start`. Send `{}` for no system prompt.
#[derive(Deserialize, Default)]
struct ChatStartRequest {
    system_prompt: Option<String>,
}

/// JSON response body for `POST /chat/start`.
#[derive(Serialize)]
struct ChatStartResponse {
    started: bool,
}

/// Handler for `POST /chat/start`.
///
/// Starts a fresh session, discarding any existing one.
async fn handle_chat_start(
    State(state): State<AppState>,
    Json(req): Json<ChatStartRequest>,
) -> Json<ChatStartResponse> {
    let mut client = state.client.lock().await;
    client.start_chat(req.system_prompt.as_deref());
    Json(ChatStartResponse { started: true })
}

// ============ POST /chat/send ============

/// JSON request body for `POST /chat/send`.
#[derive(Deserialize)]
struct ChatSendRequest {
    message: String,
}

/// Handler for `POST /chat/send`.
///
/// Appends one user turn to the held session and returns the reply. Responds
/// 409 `no_session` when `/chat/start` has not been called.
async fn handle_chat_send(
    State(state): State<AppState>,
    Json(req): Json<ChatSendRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let mut client = state.client.lock().await;
    let response = client.send_chat_message(&req.message).await?;
    Ok(Json(GenerateResponse { response }))
}

// ============ GET /chat/history ============

/// JSON response body for `GET /chat/history`.
#[derive(Serialize)]
struct HistoryResponse {
    messages: Vec<Message>,
}

/// Handler for `GET /chat/history`.
///
/// Returns the full transcript of the held session, system prompt included.
/// Responds 409 `no_session` when no session is active.
async fn handle_chat_history(
    State(state): State<AppState>,
) -> Result<Json<HistoryResponse>, AppError> {
    let client = state.client.lock().await;
    let messages = client
        .chat_history()
        .ok_or_else(|| AppError::from(LlmError::NoActiveSession))?
        .to_vec();
    Ok(Json(HistoryResponse { messages }))
}

// ============ POST /chat/reset ============

/// JSON response body for `POST /chat/reset`.
#[derive(Serialize)]
struct ChatResetResponse {
    reset: bool,
}

/// Handler for `POST /chat/reset`.
///
/// Drops the held session. Resetting when no session exists is not an error.
async fn handle_chat_reset(State(state): State<AppState>) -> Json<ChatResetResponse> {
    let mut client = state.client.lock().await;
    client.reset_chat();
    Json(ChatResetResponse { reset: true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_errors_map_to_contract_codes() {
        let cases = [
            (
                LlmError::BackendUnavailable("connection refused".to_string()),
                StatusCode::BAD_GATEWAY,
                "backend_unavailable",
            ),
            (
                LlmError::Backend("status 500".to_string()),
                StatusCode::BAD_GATEWAY,
                "backend_error",
            ),
            (LlmError::NoActiveSession, StatusCode::CONFLICT, "no_session"),
            (
                LlmError::Config("model must not be empty".to_string()),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
        ];
        for (err, status, code) in cases {
            let mapped = AppError::from(err);
            assert_eq!(mapped.status, status);
            assert_eq!(mapped.code, code);
        }
    }

    #[test]
    fn io_errors_map_to_internal() {
        let err = LlmError::io(
            "/tmp/notes.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let mapped = AppError::from(err);
        assert_eq!(mapped.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(mapped.code, "internal");
    }

    #[test]
    fn error_body_matches_contract_shape() {
        let mapped = AppError::from(LlmError::NoActiveSession);
        let body = ErrorBody {
            error: ErrorDetail {
                code: mapped.code.to_string(),
                message: mapped.message,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["error"]["code"], "no_session");
        assert!(value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("no active chat session"));
    }
}
