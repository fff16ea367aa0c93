//! # llml
//!
//! The `llml` binary drives every feature of llm-local: chunked
//! summarization, interactive chat, workspace analysis and Q&A, code
//! improvement, and the HTTP facade.
//!
//! ## Usage
//!
//! ```bash
//! llml --config ./llml.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `llml summarize <file>` | Chunked map/reduce summary of a text file |
//! | `llml chat` | Interactive chat REPL with a persistent session |
//! | `llml models` | List models installed on the backend |
//! | `llml health` | Probe the backend; exit non-zero when down |
//! | `llml analyze` | Index workspace sources for Q&A |
//! | `llml ask` | Ask questions about the analyzed workspace |
//! | `llml improve <file>` | Propose and apply a change as a unified diff |
//! | `llml serve` | Start the JSON HTTP facade |
//! | `llml completions <shell>` | Generate a shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! # Summarize a long document in at most 120 words
//! llml summarize notes/meeting.md --max-words 120
//!
//! # Chat with a system prompt
//! llml chat --system "You are a terse reviewer."
//!
//! # Index the workspace, then ask about it
//! llml analyze --root .
//! llml ask -q "where is retry handled?"
//!
//! # Propose a refactor and review the diff before applying
//! llml improve src/parser.rs --mode refactor --instruction "split the giant match"
//!
//! # Serve the HTTP facade
//! llml serve --config ./llml.toml
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use llm_local::client::LlmClient;
use llm_local::improve::ImproveMode;
use llm_local::{ask, chat, config, improve, server, summarize, workspace};

/// llml: summarize, chat, and analyze code with a locally-hosted LLM.
///
/// All commands accept `--config` pointing to a TOML configuration file.
/// Without the flag, `./llml.toml` is used when present and built-in
/// defaults otherwise.
#[derive(Parser)]
#[command(
    name = "llml",
    about = "Local LLM toolkit: summarize, chat, and analyze code with an Ollama-compatible backend",
    version,
    long_about = "llml wraps a locally running Ollama-compatible model: chunked map/reduce \
    summarization of long documents, an interactive chat REPL, a workspace analyzer with Q&A \
    over the resulting index, a propose-and-apply loop for code changes, and a JSON HTTP facade."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./llml.toml` when present; otherwise built-in defaults
    /// are used. A path given explicitly must exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Summarize a text file with chunked map/reduce.
    ///
    /// Long input is split into overlapping windows, each window is
    /// summarized with one backend call, and the partial summaries are
    /// merged into one final summary printed between `SUMMARY` rules.
    /// Input that fits a single window is summarized with a single call.
    Summarize {
        /// Path to the text file to summarize.
        file: PathBuf,

        /// Override the configured model for this run.
        #[arg(long)]
        model: Option<String>,

        /// Word bound for every summary, partial and final.
        #[arg(long)]
        max_words: Option<usize>,

        /// Sampling temperature for the summarization calls.
        #[arg(long)]
        temperature: Option<f32>,
    },

    /// Chat interactively with the backend.
    ///
    /// Runs a REPL against a persistent chat session. The full transcript
    /// is replayed to the backend on every turn, so the model sees the
    /// whole conversation.
    Chat {
        /// System prompt for the session.
        #[arg(long)]
        system: Option<String>,
    },

    /// List the models installed on the backend.
    Models,

    /// Probe the backend and exit non-zero when it is unreachable.
    Health,

    /// Index workspace sources for Q&A.
    ///
    /// Scans the workspace for source files, outlines each file's
    /// interface, asks the model for per-file and per-symbol summaries,
    /// and writes the JSON metadata index that `llml ask` searches.
    Analyze {
        /// Workspace root to scan (defaults to `[workspace].root`).
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Ask questions about the analyzed workspace.
    ///
    /// Scores index entries against the question, packs the best matches
    /// into the prompt as context, and prints the model's answer. Without
    /// `--question`, starts an interactive loop.
    Ask {
        /// One question to answer non-interactively.
        #[arg(short, long)]
        question: Option<String>,

        /// How many index entries to pack into the prompt.
        #[arg(long, default_value_t = 12)]
        top_k: usize,
    },

    /// Propose a change to one file and optionally apply it.
    ///
    /// Asks the model for a unified diff (refactor, add functionality, or
    /// docstrings), prints it for review, and applies it with `git apply`
    /// after confirmation.
    Improve {
        /// File to change (must live inside the workspace root).
        file: PathBuf,

        /// What kind of change to propose.
        #[arg(long, value_enum)]
        mode: ImproveMode,

        /// What to change, in your own words (prompted for when omitted).
        #[arg(long)]
        instruction: Option<String>,

        /// Apply the diff without asking for confirmation.
        #[arg(long)]
        auto_apply: bool,
    },

    /// Start the HTTP facade.
    ///
    /// Serves generation, model listing, and the persistent chat session
    /// as a JSON API on the address in `[server].bind`.
    Serve,

    /// Generate a shell completion script.
    ///
    /// Writes the script to stdout. Example:
    /// `llml completions bash > /etc/bash_completion.d/llml`.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Tracing to stderr so command output on stdout stays clean.
///
/// `--verbose` turns on debug logging for this crate; otherwise `RUST_LOG`
/// is honored with a `warn` fallback.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("llm_local=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Completions need neither config nor logging.
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "llml", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.verbose);
    let mut cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Summarize {
            file,
            model,
            max_words,
            temperature,
        } => {
            if let Some(model) = model {
                cfg.llm.model = model;
            }
            if let Some(max_words) = max_words {
                cfg.summarize.max_words = max_words;
            }
            summarize::run_summarize(&cfg, &file, temperature).await?;
        }
        Commands::Chat { system } => {
            chat::run_chat(&cfg, system.as_deref()).await?;
        }
        Commands::Models => {
            let client = LlmClient::new(cfg.llm.clone())?;
            let models = client.list_models().await?;
            if models.is_empty() {
                println!("No models installed on {}", cfg.llm.base_url);
            } else {
                println!("Models on {}:", cfg.llm.base_url);
                for model in models {
                    println!("  {model}");
                }
            }
        }
        Commands::Health => {
            let client = LlmClient::new(cfg.llm.clone())?;
            if client.is_backend_available().await {
                println!(
                    "ok: backend at {} answers (model: {})",
                    cfg.llm.base_url, cfg.llm.model
                );
            } else {
                anyhow::bail!(
                    "backend at {} is not reachable; is ollama running?",
                    cfg.llm.base_url
                );
            }
        }
        Commands::Analyze { root } => {
            workspace::run_analyze(&cfg, root).await?;
        }
        Commands::Ask { question, top_k } => {
            ask::run_ask(&cfg, question.as_deref(), top_k).await?;
        }
        Commands::Improve {
            file,
            mode,
            instruction,
            auto_apply,
        } => {
            improve::run_improve(&cfg, &file, mode, instruction.as_deref(), auto_apply).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
