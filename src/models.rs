//! Core value types shared across the crate.
//!
//! These types represent the messages, text chunks, and summaries that flow
//! through the client and the summarization pipeline.

use serde::{Deserialize, Serialize};

/// One turn of a conversation, in the shape the backend's chat API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation roles understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A window of a larger text. `start`/`end` are byte offsets into the source
/// text; consecutive windows may overlap by a configured amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Output of a hierarchical summarization run: the per-chunk summaries in
/// input order, and the final reduced summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryResult {
    pub chunk_summaries: Vec<String>,
    pub summary: String,
}
