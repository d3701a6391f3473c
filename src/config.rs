//! TOML configuration parsing and validation.
//!
//! One [`Config`] is loaded at startup and passed by reference into every
//! component. API keys are never stored in the file: each backend section
//! names the environment variable that holds its key.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [completion]
//! base_url = "https://albert.api.etalab.gouv.fr/v1"
//! model = "albert-small"
//!
//! [retrieval]
//! base_url = "https://albert.api.etalab.gouv.fr/v1"
//! collection = "moodle_pdfs"
//!
//! [history]
//! dir = "./data/history"
//!
//! [documents]
//! dir = "./data/documents"
//! ```

use anyhow::{bail, Context, Result};
use rag_chat_core::history::{DEFAULT_CHAR_BUDGET, DEFAULT_MAX_MESSAGES};
use rag_chat_core::retrieval::{DEFAULT_K, DEFAULT_SCORE_THRESHOLD};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub completion: CompletionConfig,
    pub retrieval: RetrievalConfig,
    pub history: HistoryConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// CORS origins; empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    pub base_url: String,
    /// Name of the collection searched on every turn.
    pub collection: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Directory holding one JSON file per session.
    pub dir: PathBuf,
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_explain_suffix")]
    pub explain_suffix: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            system_prompt: default_system_prompt(),
            explain_suffix: default_explain_suffix(),
        }
    }
}

impl PromptConfig {
    /// The prefix as a single character. Validated by [`load_config`].
    pub fn prefix_char(&self) -> char {
        self.command_prefix
            .chars()
            .next()
            .unwrap_or(rag_chat_core::command::DEFAULT_PREFIX)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    /// Directory the document acquisition process deposits files into.
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeaturesConfig {
    /// Ground answers in the collection. When off, prompts go to the chat
    /// model with history only and the retrieval backend is never called.
    #[serde(default = "default_true")]
    pub retrieval: bool,
    /// Send the persona prompt as a system message.
    #[serde(default = "default_true")]
    pub system_prompt: bool,
    /// Estimate line numbers for `source`/`find`; otherwise list chunk ids.
    #[serde(default = "default_true")]
    pub provenance: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            retrieval: true,
            system_prompt: true,
            provenance: true,
        }
    }
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_embedding_model() -> String {
    "embeddings-small".to_string()
}
fn default_k() -> usize {
    DEFAULT_K
}
fn default_score_threshold() -> f64 {
    DEFAULT_SCORE_THRESHOLD
}
fn default_char_budget() -> usize {
    DEFAULT_CHAR_BUDGET
}
fn default_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}
fn default_command_prefix() -> String {
    "/".to_string()
}
fn default_system_prompt() -> String {
    "You are a teaching assistant. Answer using the course documents provided as tool \
     context; say so when they do not contain the answer."
        .to_string()
}
fn default_explain_suffix() -> String {
    "Explain your answer in detail, step by step, as you would to a student seeing the \
     topic for the first time."
        .to_string()
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.docx".to_string(),
        "**/*.pptx".to_string(),
        "**/*.xlsx".to_string(),
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
    ]
}
fn default_true() -> bool {
    true
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Read an API key from the variable named by `var`, if set and non-empty.
pub fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.k == 0 {
        bail!("retrieval.k must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.retrieval.score_threshold) {
        bail!("retrieval.score_threshold must be in [0.0, 1.0]");
    }

    if config.retrieval.collection.trim().is_empty() {
        bail!("retrieval.collection must not be empty");
    }

    if config.history.char_budget == 0 {
        bail!("history.char_budget must be > 0");
    }

    if config.history.max_messages < 2 {
        bail!("history.max_messages must be >= 2");
    }

    if config.prompt.command_prefix.chars().count() != 1 {
        bail!(
            "prompt.command_prefix must be exactly one character, got '{}'",
            config.prompt.command_prefix
        );
    }

    if config.completion.timeout_secs == 0 || config.retrieval.timeout_secs == 0 {
        bail!("timeout_secs must be > 0");
    }

    Ok(())
}
