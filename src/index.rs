//! Flat symbol metadata index shared by `analyze` (writer) and `ask`
//! (reader).
//!
//! The index is a single JSON file mapping symbol keys to records. Keys are
//! `{relative path}` for a file's module-level record and
//! `{relative path}::{symbol}` for each top-level symbol. The file is
//! rewritten wholesale on every analysis run, never patched incrementally,
//! so a partially failed run cannot leave mixed generations behind.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Metadata for one indexed entry: the extracted interface text and the
/// model-written summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub interface: String,
    pub summary: String,
}

/// On-disk shape of the index file.
#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    generated_at: DateTime<Utc>,
    symbols: BTreeMap<String, SymbolRecord>,
}

/// Owns the index path and the in-memory entry map.
///
/// `BTreeMap` keeps entries in key order, so serialized output and
/// iteration are deterministic across runs.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    symbols: BTreeMap<String, SymbolRecord>,
}

impl MetadataStore {
    /// Empty store that will write to `path` on save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            symbols: BTreeMap::new(),
        }
    }

    /// Load an existing index. A missing file yields an empty store (the
    /// workspace just hasn't been analyzed yet); a file that exists but
    /// doesn't parse is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::new(path));
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read index: {}", path.display()))?;
        let file: IndexFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse index: {}", path.display()))?;

        Ok(Self {
            path,
            symbols: file.symbols,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the record under `key`.
    pub fn set(&mut self, key: impl Into<String>, interface: String, summary: String) {
        self.symbols
            .insert(key.into(), SymbolRecord { interface, summary });
    }

    pub fn get(&self, key: &str) -> Option<&SymbolRecord> {
        self.symbols.get(key)
    }

    /// All entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &SymbolRecord)> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Write the whole map to disk, pretty-printed, stamped with the
    /// current time.
    pub fn save(&self) -> Result<()> {
        let file = IndexFile {
            generated_at: Utc::now(),
            symbols: self.symbols.clone(),
        };
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize index")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write index: {}", self.path.display()))?;
        Ok(())
    }
}
