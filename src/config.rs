use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub summarize: SummarizeConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}
fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizeConfig {
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    #[serde(default = "default_chunk_overlap_chars")]
    pub chunk_overlap_chars: usize,
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            chunk_overlap_chars: default_chunk_overlap_chars(),
            max_words: default_max_words(),
        }
    }
}

fn default_max_chunk_chars() -> usize {
    4000
}
fn default_chunk_overlap_chars() -> usize {
    200
}
fn default_max_words() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            extensions: default_extensions(),
            exclude: Vec::new(),
            index_path: default_index_path(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_extensions() -> Vec<String> {
    vec!["rs".to_string(), "py".to_string()]
}
fn default_index_path() -> PathBuf {
    PathBuf::from("workspace_index.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Resolve the effective configuration for a CLI invocation.
///
/// An explicitly passed path must exist and parse. Without a flag, the
/// default file is used when present, and built-in defaults otherwise.
pub fn resolve_config(flag: Option<&Path>) -> Result<Config> {
    match flag {
        Some(path) => load_config(path),
        None => {
            let default_path = Path::new("llml.toml");
            if default_path.exists() {
                load_config(default_path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

pub fn validate(config: &Config) -> Result<()> {
    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }
    if config.llm.base_url.trim().is_empty() {
        anyhow::bail!("llm.base_url must not be empty");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    if config.summarize.max_chunk_chars == 0 {
        anyhow::bail!("summarize.max_chunk_chars must be > 0");
    }
    if config.summarize.chunk_overlap_chars >= config.summarize.max_chunk_chars {
        anyhow::bail!("summarize.chunk_overlap_chars must be smaller than max_chunk_chars");
    }
    if config.summarize.max_words == 0 {
        anyhow::bail!("summarize.max_words must be > 0");
    }

    if config.workspace.extensions.is_empty() {
        anyhow::bail!("workspace.extensions must not be empty");
    }
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.llm.model, "llama3.2:3b");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.max_tokens, None);
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.summarize.max_chunk_chars, 4000);
        assert_eq!(config.summarize.chunk_overlap_chars, 200);
        assert_eq!(config.summarize.max_words, 200);
        assert_eq!(config.workspace.index_path, PathBuf::from("workspace_index.json"));
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [llm]
            model = "mistral:7b"
            max_tokens = 512

            [summarize]
            max_words = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "mistral:7b");
        assert_eq!(config.llm.max_tokens, Some(512));
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.summarize.max_words, 120);
        assert_eq!(config.summarize.max_chunk_chars, 4000);
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let config: Config = toml::from_str("[llm]\ntemperature = 3.5\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let config: Config =
            toml::from_str("[summarize]\nmax_chunk_chars = 100\nchunk_overlap_chars = 100\n")
                .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn empty_model_is_rejected() {
        let config: Config = toml::from_str("[llm]\nmodel = \"  \"\n").unwrap();
        assert!(validate(&config).is_err());
    }
}
