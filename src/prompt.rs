//! Prompt templates for the summarization pipeline.
//!
//! The pipeline uses exactly two prompt shapes, selected by [`PromptKind`]:
//! a per-chunk pass over document text, and a reduce pass over the collected
//! chunk summaries. Template functions are pure and deterministic.

/// Which summarization template to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Summarize one chunk of the original document.
    ChunkSummary,
    /// Merge labelled partial summaries into one overall summary.
    ReduceSummary,
}

/// Build the summarization prompt of the given kind around `text`.
///
/// For [`PromptKind::ChunkSummary`], `text` is a document chunk. For
/// [`PromptKind::ReduceSummary`], it is the combined output of
/// [`combine_chunk_summaries`].
pub fn build_summarization_prompt(text: &str, max_words: usize, kind: PromptKind) -> String {
    match kind {
        PromptKind::ChunkSummary => format!(
            "You are a helpful assistant that summarizes documents.\n\n\
             Summarize the following text in at most {max_words} words \
             using clear, concise language that a non-expert can understand.\n\n\
             Text:\n\
             ------\n\
             {text}\n\
             ------\n\n\
             Summary:"
        ),
        PromptKind::ReduceSummary => format!(
            "You are a helpful assistant that creates a single, coherent summary \
             from multiple partial summaries.\n\n\
             Read the following partial summaries and produce one clear, concise \
             overall summary that captures the main points of the original \
             document.\n\n\
             {text}\n\n\
             Overall summary (in at most {max_words} words):"
        ),
    }
}

/// Label per-chunk summaries for the reduce pass: numbered `Chunk {n}
/// summary:` blocks separated by blank lines, in input order.
pub fn combine_chunk_summaries(summaries: &[String]) -> String {
    summaries
        .iter()
        .enumerate()
        .map(|(i, summary)| format!("Chunk {} summary:\n{}", i + 1, summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chunk_prompt_embeds_text_and_word_bound() {
        let prompt = build_summarization_prompt("some body", 150, PromptKind::ChunkSummary);
        assert!(prompt.contains("in at most 150 words"));
        assert!(prompt.contains("------\nsome body\n------"));
        assert!(prompt.ends_with("Summary:"));
    }

    #[test]
    fn reduce_prompt_embeds_partials_and_word_bound() {
        let prompt = build_summarization_prompt("partials here", 80, PromptKind::ReduceSummary);
        assert!(prompt.contains("partials here"));
        assert!(prompt.ends_with("Overall summary (in at most 80 words):"));
    }

    #[test]
    fn prompts_are_deterministic() {
        let a = build_summarization_prompt("x", 10, PromptKind::ChunkSummary);
        let b = build_summarization_prompt("x", 10, PromptKind::ChunkSummary);
        assert_eq!(a, b);
    }

    #[test]
    fn combine_numbers_chunks_from_one() {
        let combined = combine_chunk_summaries(&["first".to_string(), "second".to_string()]);
        assert_eq!(
            combined,
            "Chunk 1 summary:\nfirst\n\nChunk 2 summary:\nsecond"
        );
    }
}
