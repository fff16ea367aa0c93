//! HTTP client for a locally-hosted Ollama backend.
//!
//! [`LlmClient`] is the single point of contact with the backend: it builds
//! request payloads, parses responses, translates transport and protocol
//! failures into [`LlmError`] kinds, and holds the optional chat session.
//!
//! Construct one client per process, reuse it, and drop it at shutdown.
//! Session state is mutated in place and is not safe for concurrent use by
//! multiple callers without external synchronization; mutating methods take
//! `&mut self`, and the HTTP facade puts the whole client behind a mutex
//! for exactly this reason.
//!
//! Requests are buffered (`"stream": false`), so every call returns a
//! complete string. The only timeout is the HTTP client's request timeout;
//! when it expires the call fails with [`LlmError::BackendUnavailable`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::models::Message;
use crate::summarize::{self, SummarizeOptions, TextGenerator};

/// How long to wait for a TCP connection before giving up. Kept short so an
/// absent backend is reported quickly, independent of the request timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-call overrides merged over the client's base configuration.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Optional system-level instruction prepended to the prompt.
    pub system: Option<String>,
    /// Sampling temperature; falls back to the configured default.
    pub temperature: Option<f32>,
    /// Generation budget, mapped to Ollama's `num_predict`.
    pub max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct SamplingOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// Client for a local Ollama-compatible backend.
///
/// Cloning is cheap: clones share the underlying HTTP connection pool, while
/// each clone carries its own copy of any chat session state.
#[derive(Clone, Debug)]
pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
    session: Option<Vec<Message>>,
}

impl LlmClient {
    /// Build a client from `config`, validating it first.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        validate_llm_config(&config)?;
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;
        tracing::debug!(model = %config.model, base_url = %config.base_url, "client initialized");
        Ok(Self {
            config,
            http,
            session: None,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// One-shot completion: an optional system message plus one user prompt.
    ///
    /// Returns the backend's reply trimmed of surrounding whitespace. Fails
    /// with [`LlmError::BackendUnavailable`] when the backend cannot be
    /// reached and [`LlmError::Backend`] on a non-success status or a
    /// malformed payload.
    pub async fn generate(
        &self,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &opts.system {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));
        self.chat_completion(&messages, opts).await
    }

    /// Send an explicit transcript and return the assistant's reply.
    ///
    /// This is the stateless path under [`generate`](Self::generate) and
    /// [`send_chat_message`](Self::send_chat_message); it never touches the
    /// held session.
    pub async fn chat_completion(
        &self,
        messages: &[Message],
        opts: &GenerateOptions,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            options: SamplingOptions {
                temperature: opts.temperature.unwrap_or(self.config.temperature),
                num_predict: opts.max_tokens.or(self.config.max_tokens),
            },
        };

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            "sending chat request"
        );
        let started = std::time::Instant::now();

        let response = self
            .http
            .post(self.endpoint("/api/chat"))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!(
                "status {status}: {}",
                detail.trim()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Backend(format!("unexpected response format: {e}")))?;

        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            reply_chars = body.message.content.len(),
            "chat response received"
        );
        Ok(body.message.content.trim().to_string())
    }

    /// Lightweight health probe against the tags endpoint.
    ///
    /// Never fails: any transport or protocol error reads as "not
    /// available".
    pub async fn is_backend_available(&self) -> bool {
        match self.list_models().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "backend not available");
                false
            }
        }
    }

    /// Names of the models the backend has pulled, in backend order.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = self.endpoint("/api/tags");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Backend(format!("status {status} from {url}")));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Backend(format!("unexpected response format: {e}")))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Start a fresh chat session, discarding any prior one.
    pub fn start_chat(&mut self, system_prompt: Option<&str>) {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(Message::system(system));
        }
        self.session = Some(messages);
    }

    /// Append `text` as a user turn, replay the whole transcript to the
    /// backend, record the assistant's reply, and return it.
    ///
    /// Fails with [`LlmError::NoActiveSession`] before
    /// [`start_chat`](Self::start_chat). On backend failure the session
    /// stays active and the user turn is kept, so the caller can retry the
    /// exchange without losing it.
    pub async fn send_chat_message(&mut self, text: &str) -> Result<String, LlmError> {
        let Some(session) = self.session.as_mut() else {
            return Err(LlmError::NoActiveSession);
        };
        session.push(Message::user(text));
        let transcript = session.clone();

        let reply = self
            .chat_completion(&transcript, &GenerateOptions::default())
            .await?;

        if let Some(session) = self.session.as_mut() {
            session.push(Message::assistant(&reply));
        }
        Ok(reply)
    }

    /// Transcript of the active session, oldest first. `None` when no
    /// session has been started.
    pub fn chat_history(&self) -> Option<&[Message]> {
        self.session.as_deref()
    }

    /// Drop the active session, if any.
    pub fn reset_chat(&mut self) {
        self.session = None;
    }

    /// Hierarchical map/reduce summary of `text` using this client as the
    /// backend, with default chunking parameters. Summarization runs at
    /// temperature 0.0 for stable output; use [`summarize::summarize`]
    /// directly for full control.
    pub async fn summarize_text(&self, text: &str, max_words: usize) -> Result<String, LlmError> {
        let opts = SummarizeOptions {
            max_words,
            ..SummarizeOptions::default()
        };
        let result = summarize::summarize(self, text, &opts).await?;
        Ok(result.summary)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate_text(
        &self,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String, LlmError> {
        LlmClient::generate(self, prompt, opts).await
    }
}

fn validate_llm_config(config: &LlmConfig) -> Result<(), LlmError> {
    if config.model.trim().is_empty() {
        return Err(LlmError::Config("model must not be empty".into()));
    }
    if config.base_url.trim().is_empty() {
        return Err(LlmError::Config("base_url must not be empty".into()));
    }
    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(LlmError::Config(format!(
            "temperature {} out of range [0.0, 2.0]",
            config.temperature
        )));
    }
    if config.timeout_secs == 0 {
        return Err(LlmError::Config("timeout_secs must be > 0".into()));
    }
    Ok(())
}

/// Map a transport-level failure onto the error taxonomy: connection and
/// timeout failures mean the backend is unreachable, everything else is a
/// backend-side problem.
fn transport_error(err: reqwest::Error) -> LlmError {
    if err.is_connect() || err.is_timeout() {
        LlmError::BackendUnavailable(err.to_string())
    } else {
        LlmError::Backend(err.to_string())
    }
}
