//! Index-backed Q&A over an analyzed workspace.
//!
//! Retrieval is deliberately primitive: question tokens are matched as
//! substrings against each index entry's key, interface, and summary, and
//! the top-scored entries become the prompt context. No embeddings, no
//! backend call until the answer itself is generated.

use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};

use crate::client::{GenerateOptions, LlmClient};
use crate::code::FENCE;
use crate::config::Config;
use crate::error::LlmError;
use crate::index::{MetadataStore, SymbolRecord};
use crate::summarize::TextGenerator;

/// Characters trimmed from token ends before matching.
const PUNCTUATION: &str = ".,:;!?()[]{}\"'";

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c| PUNCTUATION.contains(c)).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Number of question tokens present somewhere in the entry. Each token
/// counts once no matter how often it appears.
fn score_entry(tokens: &[String], key: &str, record: &SymbolRecord) -> usize {
    let haystack =
        format!("{key}\n{}\n{}", record.interface, record.summary).to_lowercase();
    tokens
        .iter()
        .filter(|t| haystack.contains(t.as_str()))
        .count()
}

/// Top-scored entries for a question, best first. Zero-score entries are
/// dropped; ties keep index key order. Always selects at least one slot
/// even when `top_k` is zero.
fn select_relevant<'a>(
    store: &'a MetadataStore,
    question: &str,
    top_k: usize,
) -> Vec<(&'a String, &'a SymbolRecord)> {
    let tokens = tokenize(question);
    let mut scored: Vec<(usize, &String, &SymbolRecord)> = store
        .entries()
        .filter_map(|(key, record)| {
            let score = score_entry(&tokens, key, record);
            (score > 0).then_some((score, key, record))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(top_k.max(1));
    scored.into_iter().map(|(_, key, record)| (key, record)).collect()
}

fn build_context(relevant: &[(&String, &SymbolRecord)]) -> String {
    if relevant.is_empty() {
        return "No relevant symbols were matched from the metadata index. \
                Answer with best-effort guidance and suggest how to improve the \
                index (e.g., re-run analysis or broaden the question)."
            .to_string();
    }

    let blocks: Vec<String> = relevant
        .iter()
        .map(|(key, record)| {
            format!(
                "Symbol: {key}\nInterface:\n{}\nSummary:\n{}",
                record.interface.trim(),
                record.summary.trim()
            )
        })
        .collect();
    blocks.join("\n\n---\n\n")
}

fn build_answer_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an expert software engineering assistant.\n\n\
         You are answering questions about a codebase using a metadata index that contains:\n\
         - an interface (signatures/doc comments) for each indexed symbol\n\
         - a short summary for each indexed symbol\n\n\
         Important rules:\n\
         - Prefer pointing to the most relevant symbol(s) and file paths.\n\
         - If multiple candidates exist, list them and explain why.\n\
         - If the metadata is insufficient to answer confidently, say what is missing \
         and suggest what to inspect next (e.g., which file/symbol to open).\n\
         - Do NOT invent symbols or file paths that are not present in the metadata.\n\n\
         Metadata context:\n{FENCE}\n{context}\n{FENCE}\n\n\
         Question:\n{question}\n\n\
         Answer:"
    )
}

/// Select context and generate one answer. The model is always called,
/// even when nothing matched; the fallback context tells it so.
async fn answer_question(
    generator: &dyn TextGenerator,
    store: &MetadataStore,
    question: &str,
    top_k: usize,
) -> Result<String, LlmError> {
    let relevant = select_relevant(store, question, top_k);
    let context = build_context(&relevant);
    let prompt = build_answer_prompt(&context, question);
    generator
        .generate_text(&prompt, &GenerateOptions::default())
        .await
}

async fn interactive_loop(
    client: &LlmClient,
    store: &MetadataStore,
    top_k: usize,
) -> Result<()> {
    println!("Workspace Q&A mode");
    println!("Type your question and press Enter.");
    println!("Type 'exit' or 'quit' to stop.");
    println!("{}", "-".repeat(60));

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("\n> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        println!("Searching metadata and generating an answer...");
        let reply = answer_question(client, store, question, top_k).await?;
        println!("\n{reply}");
    }
    Ok(())
}

/// `llml ask`: one-shot with `--question`, interactive otherwise.
pub async fn run_ask(config: &Config, question: Option<&str>, top_k: usize) -> Result<()> {
    let index_path = &config.workspace.index_path;
    if !index_path.exists() {
        bail!(
            "Index not found: {}. Run `llml analyze` first.",
            index_path.display()
        );
    }
    let store = MetadataStore::load(index_path)?;
    println!(
        "Loaded {} index entries from {}",
        store.len(),
        index_path.display()
    );

    let client = LlmClient::new(config.llm.clone())?;
    if !client.is_backend_available().await {
        bail!(
            "backend at {} is not reachable; is ollama running?",
            config.llm.base_url
        );
    }

    match question {
        Some(q) => {
            let reply = answer_question(&client, &store, q, top_k).await?;
            println!("\n{reply}");
            Ok(())
        }
        None => interactive_loop(&client, &store, top_k).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate_text(
            &self,
            prompt: &str,
            _opts: &GenerateOptions,
        ) -> Result<String, LlmError> {
            Ok(prompt.to_string())
        }
    }

    fn sample_store() -> MetadataStore {
        let mut store = MetadataStore::new("unused.json");
        store.set(
            "src/chunk.rs",
            "pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize)".to_string(),
            "Splits text into overlapping windows.".to_string(),
        );
        store.set(
            "src/chunk.rs::chunk_text",
            "pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize)".to_string(),
            "Deterministic chunking with overlap.".to_string(),
        );
        store.set(
            "src/server.rs",
            "pub fn router(state: AppState) -> Router".to_string(),
            "HTTP facade over the client.".to_string(),
        );
        store
    }

    #[test]
    fn tokenize_trims_punctuation_and_lowercases() {
        assert_eq!(
            tokenize("How does (chunk_text) work?! "),
            vec!["how", "does", "chunk_text", "work"]
        );
        assert!(tokenize("  ... !!  ").is_empty());
    }

    #[test]
    fn scoring_counts_each_token_once() {
        let record = SymbolRecord {
            interface: "chunk chunk chunk".to_string(),
            summary: String::new(),
        };
        let tokens = tokenize("chunk");
        assert_eq!(score_entry(&tokens, "k", &record), 1);
    }

    #[test]
    fn selection_orders_by_score_and_drops_misses() {
        let store = sample_store();
        let relevant = select_relevant(&store, "how does chunking overlap work", 12);

        // Both chunk entries match "overlap"; the symbol entry also
        // matches "chunking" via its summary. Nothing matches the router.
        assert_eq!(relevant[0].0, "src/chunk.rs::chunk_text");
        assert!(relevant.iter().all(|(k, _)| !k.contains("server")));
    }

    #[test]
    fn selection_truncates_to_top_k() {
        let store = sample_store();
        let relevant = select_relevant(&store, "chunk_text overlap", 1);
        assert_eq!(relevant.len(), 1);
    }

    #[test]
    fn top_k_zero_still_selects_one() {
        let store = sample_store();
        let relevant = select_relevant(&store, "chunk_text", 0);
        assert_eq!(relevant.len(), 1);
    }

    #[test]
    fn ties_keep_key_order() {
        let mut store = MetadataStore::new("unused.json");
        store.set("b.rs", "widget".to_string(), String::new());
        store.set("a.rs", "widget".to_string(), String::new());

        let relevant = select_relevant(&store, "widget", 12);
        let keys: Vec<&str> = relevant.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["a.rs", "b.rs"]);
    }

    #[test]
    fn empty_selection_gets_fallback_context() {
        let context = build_context(&[]);
        assert!(context.contains("No relevant symbols were matched"));
    }

    #[test]
    fn answer_prompt_carries_rules_and_question() {
        let prompt = build_answer_prompt("Symbol: a.rs", "where is chunking?");
        assert!(prompt.contains("Do NOT invent symbols or file paths"));
        assert!(prompt.contains("Symbol: a.rs"));
        assert!(prompt.contains("Question:\nwhere is chunking?"));
    }

    #[tokio::test]
    async fn answer_question_feeds_selected_context_to_the_model() {
        let store = sample_store();
        let prompt = answer_question(&EchoGenerator, &store, "chunk_text overlap", 12)
            .await
            .unwrap();
        assert!(prompt.contains("Symbol: src/chunk.rs::chunk_text"));
    }

    #[tokio::test]
    async fn unmatched_question_still_calls_the_model() {
        let store = sample_store();
        let prompt = answer_question(&EchoGenerator, &store, "zzz qqq", 12)
            .await
            .unwrap();
        assert!(prompt.contains("No relevant symbols were matched"));
    }
}
