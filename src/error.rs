//! Error taxonomy for the client, chunker, and summarization pipeline.
//!
//! Every failure class has its own variant so callers can react to the kind
//! rather than parse messages. There are no retries anywhere: each failure
//! surfaces to the immediate caller of the operation that hit it, and a
//! failed call never poisons the client for later use.

use std::path::PathBuf;

/// Errors produced by this crate's library layer.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Invalid construction or chunking parameters. Local, never retried.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A file could not be read or written.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend could not be reached: connection refused or timed out.
    /// The caller may retry; the client itself stays usable.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered, but with a non-success status or a payload
    /// missing the expected fields. Includes backend detail when available.
    #[error("backend error: {0}")]
    Backend(String),

    /// A chat call was made with no active session.
    #[error("no active chat session; call start_chat first")]
    NoActiveSession,

    /// A map or reduce call failed, so the whole summarization run was
    /// abandoned. Wraps the triggering error; no partial result exists.
    #[error("summarization failed: {0}")]
    SummarizationFailed(#[source] Box<LlmError>),
}

impl LlmError {
    /// Wrap a file-access failure with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LlmError::Io {
            path: path.into(),
            source,
        }
    }
}
