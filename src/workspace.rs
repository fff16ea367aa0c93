//! Workspace analysis: walk a source tree, outline each file's top-level
//! symbols, and build the metadata index with model-written summaries.
//!
//! The scanner is a deterministic line-based pass, not a parser. It finds
//! top-level declarations, bounds each one's source block, and assembles
//! interface text from doc comments and signatures. Only the summaries
//! come from the model, so the scanner itself is testable offline.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::client::LlmClient;
use crate::code::{language_for, CodeService};
use crate::config::Config;
use crate::index::MetadataStore;

/// Directories never worth indexing, merged with configured excludes.
const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/target/**",
    "**/node_modules/**",
    "**/.venv/**",
    "**/venv/**",
    "**/__pycache__/**",
];

/// Upper bound on lines captured for one symbol's block.
const MAX_BLOCK_LINES: usize = 200;

/// Lines a declaration signature may span before it is cut off.
const MAX_SIGNATURE_LINES: usize = 8;

// ───────────────────────────────────────────────────────────────────────
// Symbol scanning
// ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Struct,
    Enum,
    Trait,
    Class,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SymbolKind::Function => "function",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Trait => "trait",
            SymbolKind::Class => "class",
        };
        f.write_str(label)
    }
}

/// One top-level symbol found by the scanner.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Statically assembled interface text: doc/attribute prelude, the
    /// declaration signature, and method signatures for container kinds.
    pub interface: String,
}

/// Scan result for one file.
#[derive(Debug, Default)]
pub struct Outline {
    /// Top-level declaration signatures in file order.
    pub interface: String,
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Fn,
    Struct,
    Enum,
    Trait,
    Impl,
    Class,
    Def,
}

struct Decl {
    kind: DeclKind,
    name: String,
    /// First line of the doc/attribute prelude above the declaration.
    prelude: usize,
    /// The declaration line itself.
    line: usize,
}

/// Outline a source file. Languages the scanner does not understand yield
/// an empty outline; the file can still get a model-written summary.
pub fn outline(code: &str, language: &str) -> Outline {
    let lines: Vec<&str> = code.lines().collect();
    let decls = match language {
        "rust" => find_decls(&lines, parse_rust_decl, is_rust_prelude),
        "python" => find_decls(&lines, parse_python_decl, is_python_prelude),
        _ => Vec::new(),
    };

    let mut symbols: Vec<Symbol> = Vec::new();
    let mut module_sigs: Vec<String> = Vec::new();
    let mut impl_methods: Vec<(String, Vec<String>)> = Vec::new();

    for (i, decl) in decls.iter().enumerate() {
        let block_end = decls
            .get(i + 1)
            .map(|next| next.prelude)
            .unwrap_or(lines.len())
            .min(decl.prelude + MAX_BLOCK_LINES);
        let body_start = (decl.line + 1).min(block_end);
        let body = &lines[body_start..block_end];

        let kind = match decl.kind {
            DeclKind::Impl => {
                impl_methods.push((decl.name.clone(), rust_method_signatures(body)));
                continue;
            }
            DeclKind::Fn | DeclKind::Def => SymbolKind::Function,
            DeclKind::Struct => SymbolKind::Struct,
            DeclKind::Enum => SymbolKind::Enum,
            DeclKind::Trait => SymbolKind::Trait,
            DeclKind::Class => SymbolKind::Class,
        };

        let signature = signature_at(&lines, decl.line, language);
        module_sigs.push(signature.clone());

        let mut parts: Vec<String> = lines[decl.prelude..decl.line]
            .iter()
            .map(|l| l.to_string())
            .collect();
        parts.push(signature);
        match decl.kind {
            DeclKind::Trait => parts.extend(rust_method_signatures(body)),
            DeclKind::Class => parts.extend(python_method_signatures(body)),
            _ => {}
        }

        symbols.push(Symbol {
            name: decl.name.clone(),
            kind,
            interface: parts.join("\n"),
        });
    }

    // Fold impl-block methods into the interface of the type they
    // implement for, when that type is declared in the same file.
    for (target, sigs) in impl_methods {
        if sigs.is_empty() {
            continue;
        }
        let hit = symbols
            .iter_mut()
            .find(|s| s.name == target && matches!(s.kind, SymbolKind::Struct | SymbolKind::Enum));
        if let Some(symbol) = hit {
            symbol.interface.push('\n');
            symbol.interface.push_str(&sigs.join("\n"));
        }
    }

    Outline {
        interface: module_sigs.join("\n"),
        symbols,
    }
}

fn find_decls(
    lines: &[&str],
    parse: fn(&str) -> Option<(DeclKind, String)>,
    is_prelude: fn(&str) -> bool,
) -> Vec<Decl> {
    let mut decls = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let Some(first) = line.chars().next() else {
            continue;
        };
        if first.is_whitespace() {
            continue;
        }
        if let Some((kind, name)) = parse(line) {
            let mut prelude = i;
            while prelude > 0 && is_prelude(lines[prelude - 1]) {
                prelude -= 1;
            }
            decls.push(Decl {
                kind,
                name,
                prelude,
                line: i,
            });
        }
    }
    decls
}

fn is_rust_prelude(line: &str) -> bool {
    line.starts_with("///") || line.starts_with("#[")
}

fn is_python_prelude(line: &str) -> bool {
    line.starts_with('@')
}

fn parse_rust_decl(line: &str) -> Option<(DeclKind, String)> {
    let rest = strip_rust_modifiers(line);
    if let Some(r) = rest.strip_prefix("fn ") {
        return ident(r).map(|n| (DeclKind::Fn, n));
    }
    if let Some(r) = rest.strip_prefix("struct ") {
        return ident(r).map(|n| (DeclKind::Struct, n));
    }
    if let Some(r) = rest.strip_prefix("enum ") {
        return ident(r).map(|n| (DeclKind::Enum, n));
    }
    if let Some(r) = rest.strip_prefix("trait ") {
        return ident(r).map(|n| (DeclKind::Trait, n));
    }
    if let Some(r) = rest.strip_prefix("impl") {
        if r.starts_with('<') || r.starts_with(' ') {
            return impl_target(r).map(|n| (DeclKind::Impl, n));
        }
    }
    None
}

fn parse_python_decl(line: &str) -> Option<(DeclKind, String)> {
    if let Some(r) = line.strip_prefix("class ") {
        return ident(r).map(|n| (DeclKind::Class, n));
    }
    let rest = line.strip_prefix("async ").unwrap_or(line);
    if let Some(r) = rest.strip_prefix("def ") {
        return ident(r).map(|n| (DeclKind::Def, n));
    }
    None
}

fn strip_rust_modifiers(line: &str) -> &str {
    let mut s = line;
    loop {
        let before = s;
        for prefix in [
            "pub(crate) ",
            "pub(super) ",
            "pub ",
            "async ",
            "unsafe ",
            "const ",
            "extern \"C\" ",
        ] {
            if let Some(rest) = s.strip_prefix(prefix) {
                s = rest;
            }
        }
        if s.len() == before.len() {
            return s;
        }
    }
}

/// Leading identifier of `s`, if any.
fn ident(s: &str) -> Option<String> {
    let name: String = s
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

/// Self-type name of an impl header: `impl<T> Foo<T>` and
/// `impl Display for Foo` both resolve to `Foo`.
fn impl_target(after_impl: &str) -> Option<String> {
    let mut s = after_impl;
    if s.starts_with('<') {
        let bytes = s.as_bytes();
        let mut depth = 0usize;
        let mut cut = None;
        for (i, c) in s.char_indices() {
            match c {
                '<' => depth += 1,
                // `->` inside generic bounds is not a closing bracket.
                '>' if i > 0 && bytes[i - 1] == b'-' => {}
                '>' => {
                    depth -= 1;
                    if depth == 0 {
                        cut = Some(i + 1);
                        break;
                    }
                }
                _ => {}
            }
        }
        s = &s[cut?..];
    }
    let s = s.trim_start();
    let head = match s.find(" for ") {
        Some(pos) => s[pos + 5..].trim_start(),
        None => s,
    };
    ident(head)
}

/// Declaration signature starting at `start`, spanning continuation lines
/// up to the opening brace (Rust) or the trailing colon (Python).
fn signature_at(lines: &[&str], start: usize, language: &str) -> String {
    let mut sig = Vec::new();
    for line in lines.iter().skip(start).take(MAX_SIGNATURE_LINES) {
        let trimmed = line.trim_end();
        if language == "python" {
            sig.push(trimmed.to_string());
            if trimmed.ends_with(':') {
                break;
            }
        } else {
            match trimmed.find('{') {
                Some(pos) => {
                    sig.push(trimmed[..pos].trim_end().to_string());
                    break;
                }
                None => {
                    sig.push(trimmed.to_string());
                    if trimmed.ends_with(';') {
                        break;
                    }
                }
            }
        }
    }
    sig.join("\n")
}

/// `fn` signatures one indentation level into a Rust block.
fn rust_method_signatures(body: &[&str]) -> Vec<String> {
    let mut sigs = Vec::new();
    for line in body {
        let indent = line.len() - line.trim_start().len();
        if !(1..=4).contains(&indent) {
            continue;
        }
        if strip_rust_modifiers(line.trim_start()).starts_with("fn ") {
            let trimmed = line.trim();
            let sig = match trimmed.find('{') {
                Some(pos) => trimmed[..pos].trim_end(),
                None => trimmed,
            };
            sigs.push(format!("    {sig}"));
        }
    }
    sigs
}

/// `def` signatures one indentation level into a Python class body.
fn python_method_signatures(body: &[&str]) -> Vec<String> {
    let mut sigs = Vec::new();
    for line in body {
        let indent = line.len() - line.trim_start().len();
        if !(1..=4).contains(&indent) {
            continue;
        }
        let trimmed = line.trim();
        let rest = trimmed.strip_prefix("async ").unwrap_or(trimmed);
        if rest.starts_with("def ") {
            sigs.push(format!("    {trimmed}"));
        }
    }
    sigs
}

// ───────────────────────────────────────────────────────────────────────
// File collection
// ───────────────────────────────────────────────────────────────────────

/// Collect source files under `root` matching the configured extensions,
/// as sorted root-relative paths.
pub fn collect_source_files(
    root: &Path,
    extensions: &[String],
    extra_excludes: &[String],
) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        bail!("Workspace root does not exist: {}", root.display());
    }

    let include_patterns: Vec<String> = extensions
        .iter()
        .map(|ext| format!("**/*.{ext}"))
        .collect();
    let include_set = build_globset(&include_patterns)?;

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(extra_excludes.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy();

        if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
            continue;
        }
        files.push(relative.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

// ───────────────────────────────────────────────────────────────────────
// Analyze command
// ───────────────────────────────────────────────────────────────────────

/// `llml analyze`: index every source file under the workspace root.
pub async fn run_analyze(config: &Config, root: Option<PathBuf>) -> Result<()> {
    let root = root.unwrap_or_else(|| config.workspace.root.clone());
    let client = LlmClient::new(config.llm.clone())?;
    if !client.is_backend_available().await {
        bail!(
            "backend at {} is not reachable; is ollama running?",
            config.llm.base_url
        );
    }

    let files = collect_source_files(
        &root,
        &config.workspace.extensions,
        &config.workspace.exclude,
    )?;
    if files.is_empty() {
        println!("No source files found under {}", root.display());
        return Ok(());
    }

    let mut store = MetadataStore::new(&config.workspace.index_path);
    for rel in &files {
        if let Err(e) = analyze_file(&client, &mut store, &root, rel).await {
            eprintln!("Warning: failed to analyze {}: {:#}", rel.display(), e);
        }
    }

    store.save()?;
    println!(
        "Indexed {} entries from {} files to {}",
        store.len(),
        files.len(),
        store.path().display()
    );
    Ok(())
}

async fn analyze_file(
    client: &LlmClient,
    store: &mut MetadataStore,
    root: &Path,
    rel: &Path,
) -> Result<()> {
    let path = root.join(rel);
    let code = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let rel_str = rel.to_string_lossy().to_string();
    let language = language_for(rel);
    let file_outline = outline(&code, language);

    println!("Analyzing {rel_str}");

    let file_context = format!("File: {rel_str}");
    let service = CodeService::new(client, &code, language)
        .with_context(&file_context)
        .with_file_path(&rel_str);

    let module_summary = service.describe_module().await?;
    store.set(rel_str.clone(), file_outline.interface.clone(), module_summary);
    println!("  indexed module");

    for symbol in &file_outline.symbols {
        let summary = service.describe_symbol(&symbol.name).await?;
        store.set(
            format!("{rel_str}::{}", symbol.name),
            symbol.interface.clone(),
            summary,
        );
        println!("  indexed {} {}", symbol.kind, symbol.name);
    }
    Ok(())
}
