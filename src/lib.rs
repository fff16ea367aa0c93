//! # llm-local
//!
//! A local-first LLM toolkit for an Ollama-compatible backend.
//!
//! llm-local wraps a locally running model behind a small typed client and
//! builds workday tooling on top of it: chunked map/reduce summarization of
//! long documents, a workspace analyzer that indexes code interfaces and
//! summaries, Q&A over that index, and a propose-and-apply loop for code
//! changes, all driven from one CLI and an optional HTTP facade.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────┐
//! │ Files &   │──▶│  Chunker +   │──▶│ LlmClient │──▶ Ollama
//! │ workspace │   │   prompts    │   │  (HTTP)   │
//! └───────────┘   └──────────────┘   └─────┬─────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │  (llml)  │       │  facade  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! llml health                      # probe the backend
//! llml summarize notes.md          # chunked map/reduce summary
//! llml chat --system "Be terse"    # interactive chat REPL
//! llml analyze                     # index the workspace
//! llml ask -q "where is chunking?" # Q&A over the index
//! llml improve src/lib.rs --mode refactor
//! llml serve                       # start the HTTP facade
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with per-section defaults |
//! | [`error`] | Error taxonomy for the library layer |
//! | [`models`] | Chat messages, chunks, summary results |
//! | [`client`] | Ollama-compatible HTTP client with chat sessions |
//! | [`chunk`] | Character-window text chunking |
//! | [`prompt`] | Prompt construction for summarization |
//! | [`summarize`] | Map/reduce summarization pipeline |
//! | [`code`] | Prompt-level code operations (describe, tests, diffs) |
//! | [`workspace`] | Source scanning and interface outlines |
//! | [`index`] | JSON metadata index |
//! | [`ask`] | Retrieval and Q&A over the index |
//! | [`patch`] | Reply cleanup and `git apply` |
//! | [`improve`] | Propose-and-apply workflow for code changes |
//! | [`chat`] | Interactive chat REPL |
//! | [`server`] | HTTP facade |

pub mod ask;
pub mod chat;
pub mod chunk;
pub mod client;
pub mod code;
pub mod config;
pub mod error;
pub mod improve;
pub mod index;
pub mod models;
pub mod patch;
pub mod prompt;
pub mod server;
pub mod summarize;
pub mod workspace;
