//! Hierarchical map/reduce summarization.
//!
//! Long input is chunked, each chunk is summarized with one backend call
//! (map), and the collected summaries are merged with one final call
//! (reduce). Input that fits a single window skips the reduce pass, so one
//! window costs exactly one backend call and N windows cost N + 1.
//!
//! Calls are issued strictly in input order, one at a time. Any generation
//! failure aborts the whole run as [`LlmError::SummarizationFailed`]; no
//! partial result is returned and nothing is retried.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;

use crate::chunk::{chunk_text, load_text_file};
use crate::client::{GenerateOptions, LlmClient};
use crate::config::{Config, SummarizeConfig};
use crate::error::LlmError;
use crate::models::SummaryResult;
use crate::prompt::{build_summarization_prompt, combine_chunk_summaries, PromptKind};

/// Anything that can turn a prompt into generated text.
///
/// [`LlmClient`] is the production implementation; tests use scripted
/// stand-ins to observe call counts and prompt contents.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String, LlmError>;
}

/// Tuning knobs for one summarization run.
#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    /// Word bound requested for every summary, partial and final.
    pub max_words: usize,
    /// Window size in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive windows.
    pub overlap: usize,
    /// Sampling temperature for the summarization calls.
    pub temperature: f32,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            max_words: 200,
            chunk_size: 4000,
            overlap: 200,
            temperature: 0.0,
        }
    }
}

impl SummarizeOptions {
    pub fn from_config(config: &SummarizeConfig) -> Self {
        Self {
            max_words: config.max_words,
            chunk_size: config.max_chunk_chars,
            overlap: config.chunk_overlap_chars,
            ..Self::default()
        }
    }
}

/// Run the full map/reduce pipeline over `text`.
///
/// Invalid chunk parameters surface as [`LlmError::Config`]; generation
/// failures as [`LlmError::SummarizationFailed`] wrapping the backend
/// error.
pub async fn summarize<G>(
    generator: &G,
    text: &str,
    opts: &SummarizeOptions,
) -> Result<SummaryResult, LlmError>
where
    G: TextGenerator + ?Sized,
{
    let chunks = chunk_text(text, opts.chunk_size, opts.overlap)?;
    let gen_opts = GenerateOptions {
        temperature: Some(opts.temperature),
        ..GenerateOptions::default()
    };

    tracing::debug!(chunks = chunks.len(), "summarizing text");

    let mut chunk_summaries = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        tracing::debug!(chunk = i + 1, total = chunks.len(), "summarizing chunk");
        let prompt =
            build_summarization_prompt(&chunk.text, opts.max_words, PromptKind::ChunkSummary);
        let summary = generator
            .generate_text(&prompt, &gen_opts)
            .await
            .map_err(|e| LlmError::SummarizationFailed(Box::new(e)))?;
        chunk_summaries.push(summary.trim().to_string());
    }

    // A single window's summary stands as the final summary; the reduce
    // pass would only restate it.
    if chunk_summaries.len() == 1 {
        let summary = chunk_summaries[0].clone();
        return Ok(SummaryResult {
            chunk_summaries,
            summary,
        });
    }

    let combined = combine_chunk_summaries(&chunk_summaries);
    let prompt = build_summarization_prompt(&combined, opts.max_words, PromptKind::ReduceSummary);
    let summary = generator
        .generate_text(&prompt, &gen_opts)
        .await
        .map_err(|e| LlmError::SummarizationFailed(Box::new(e)))?;

    Ok(SummaryResult {
        chunk_summaries,
        summary: summary.trim().to_string(),
    })
}

/// CLI entry: summarize a file and print the result between `SUMMARY`
/// rules. `temperature` overrides the summarization default for this run.
pub async fn run_summarize(
    config: &Config,
    path: &Path,
    temperature: Option<f32>,
) -> anyhow::Result<()> {
    let text = load_text_file(path)?;
    let client = LlmClient::new(config.llm.clone())?;
    if !client.is_backend_available().await {
        anyhow::bail!(
            "backend at {} is not reachable; is ollama running?",
            config.llm.base_url
        );
    }

    let mut opts = SummarizeOptions::from_config(&config.summarize);
    if let Some(temperature) = temperature {
        opts.temperature = temperature;
    }
    println!(
        "Summarizing {} ({} chars) with {}",
        path.display(),
        text.chars().count(),
        config.llm.model
    );

    let result = summarize(&client, &text, &opts)
        .await
        .with_context(|| format!("summarizing {}", path.display()))?;

    if result.chunk_summaries.len() > 1 {
        println!(
            "Reduced {} chunk summaries into a final summary.",
            result.chunk_summaries.len()
        );
    }

    let rule = "=".repeat(70);
    println!("{rule}");
    println!("SUMMARY");
    println!("{rule}");
    println!("{}", result.summary);
    println!("{rule}");
    Ok(())
}
