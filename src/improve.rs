//! `llml improve`: propose a change to one file as a unified diff,
//! review it, and apply it with git.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::client::LlmClient;
use crate::code::{language_for, CodeService, OutputFormat};
use crate::config::Config;
use crate::patch::{apply_patch, looks_like_diff, strip_code_fence};

/// What kind of change to propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImproveMode {
    /// Refactor toward the stated goal, preserving behavior.
    Refactor,
    /// Add the functionality described in the instruction.
    Add,
    /// Add or improve documentation comments.
    Docstrings,
}

impl ImproveMode {
    fn label(self) -> &'static str {
        match self {
            ImproveMode::Refactor => "refactor",
            ImproveMode::Add => "add",
            ImproveMode::Docstrings => "docstrings",
        }
    }
}

pub async fn run_improve(
    config: &Config,
    file: &Path,
    mode: ImproveMode,
    instruction: Option<&str>,
    auto_apply: bool,
) -> Result<()> {
    let root = config.workspace.root.canonicalize().with_context(|| {
        format!(
            "Workspace root does not exist: {}",
            config.workspace.root.display()
        )
    })?;

    let target = if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    };
    let target = target
        .canonicalize()
        .with_context(|| format!("Target file does not exist: {}", target.display()))?;
    if !target.is_file() {
        bail!("Target is not a file: {}", target.display());
    }

    // Relative diff headers let `git apply` locate the file from the root.
    let file_label = match target.strip_prefix(&root) {
        Ok(rel) => rel.to_string_lossy().to_string(),
        Err(_) => {
            eprintln!("Warning: file is not inside the workspace root; patch apply may fail.");
            target.to_string_lossy().to_string()
        }
    };

    println!("Code suggestion and apply tool");
    println!("Workspace: {}", root.display());
    println!("Target file: {file_label}");
    println!("Model: {}", config.llm.model);
    println!("Mode: {}", mode.label());
    println!("{}", "-".repeat(70));

    let instruction = match mode {
        ImproveMode::Docstrings => instruction.unwrap_or("").to_string(),
        _ => match instruction {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => prompt_for_instruction()?,
        },
    };

    let client = LlmClient::new(config.llm.clone())?;
    if !client.is_backend_available().await {
        bail!(
            "backend at {} is not reachable; is ollama running?",
            config.llm.base_url
        );
    }

    let code = std::fs::read_to_string(&target)
        .with_context(|| format!("Failed to read {}", target.display()))?;
    let language = language_for(&target);
    let service = CodeService::new(&client, &code, language).with_file_path(&file_label);

    println!("Generating proposed changes (diff)...");
    let reply = match mode {
        ImproveMode::Refactor => {
            service
                .refactor(&instruction, OutputFormat::UnifiedDiff)
                .await?
        }
        ImproveMode::Add => {
            service
                .add_functionality(&instruction, OutputFormat::UnifiedDiff)
                .await?
        }
        ImproveMode::Docstrings => service.docstrings(OutputFormat::UnifiedDiff).await?,
    };
    let diff = strip_code_fence(&reply);

    let rule = "=".repeat(70);
    println!("\n{rule}");
    println!("PROPOSED DIFF");
    println!("{rule}");
    println!("{}", diff.trim_end());
    println!("{rule}\n");

    if !looks_like_diff(diff) {
        bail!("the model reply does not look like a unified diff; nothing was applied");
    }

    let do_apply = if auto_apply {
        println!("auto-apply enabled: applying diff without confirmation.");
        true
    } else {
        confirm("Apply this diff to your workspace? [y/n]: ")?
    };
    if !do_apply {
        println!("Not applying diff.");
        return Ok(());
    }

    println!("Checking whether the diff applies cleanly...");
    apply_patch(diff, &root)?;

    println!("Diff applied successfully.");
    println!("Next steps:");
    println!("  - Review: git diff");
    println!("  - Run your tests");
    println!("  - Commit: git commit -am \"describe the change\"");
    Ok(())
}

fn prompt_for_instruction() -> Result<String> {
    if !atty::is(atty::Stream::Stdin) {
        bail!("no instruction given; pass --instruction or run interactively");
    }
    println!("Describe what you want (e.g. 'refactor for readability', 'add method X', ...):");
    print!("> ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let instruction = line.trim().to_string();
    if instruction.is_empty() {
        bail!("no instruction given");
    }
    Ok(instruction)
}

fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        bail!("stdin is not a terminal; re-run with --auto-apply to skip confirmation");
    }
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{prompt}");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("Please answer 'y' or 'n'."),
        }
    }
}
