use std::fmt;
use std::path::PathBuf;

use scout_index::DistanceMetric;
use scout_index::scanner::{DEFAULT_EXCLUDED_DIRS, DEFAULT_EXTENSIONS};
use scout_index::truncate::DEFAULT_MAX_EMBED_CHARS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Claude,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Claude => "claude",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_model() -> String {
    "mistral:7b".into()
}

fn default_embedding_model() -> String {
    "jina/jina-embeddings-v2-small-en".into()
}

fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Chat model used for candidate selection.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudLlmConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAiConfig>,
    /// Separate embedding backend. Required when `provider` has no embeddings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingBackendConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            cloud: None,
            openai: None,
            embedding: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudLlmConfig {
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub embedding_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingBackendConfig {
    pub provider: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./data/scout.db")
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect()
}

fn default_excluded_dirs() -> Vec<String> {
    DEFAULT_EXCLUDED_DIRS
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_follow_links() -> bool {
    true
}

fn default_max_embed_chars() -> usize {
    DEFAULT_MAX_EMBED_CHARS
}

fn default_concurrency() -> usize {
    4
}

fn default_embed_timeout_secs() -> u64 {
    30
}

fn default_embed_retries() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
    #[serde(default)]
    pub respect_gitignore: bool,
    #[serde(default = "default_follow_links")]
    pub follow_links: bool,
    /// Characters of each file fed to the embedding model. Full content is still stored.
    #[serde(default = "default_max_embed_chars")]
    pub max_embed_chars: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
    #[serde(default = "default_embed_retries")]
    pub embed_retries: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
            extensions: default_extensions(),
            excluded_dirs: default_excluded_dirs(),
            respect_gitignore: false,
            follow_links: default_follow_links(),
            max_embed_chars: default_max_embed_chars(),
            concurrency: default_concurrency(),
            embed_timeout_secs: default_embed_timeout_secs(),
            embed_retries: default_embed_retries(),
        }
    }
}

fn default_max_candidates() -> usize {
    20
}

fn default_max_query_chars() -> usize {
    2000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Nearest neighbors handed to the selector.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            max_query_chars: default_max_query_chars(),
            metric: DistanceMetric::default(),
        }
    }
}

/// Wrapper for sensitive strings with redacted Debug/Display.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// API keys resolved from the environment. Never read from or written to TOML.
#[derive(Debug, Default, Clone)]
pub struct ResolvedSecrets {
    pub claude_api_key: Option<Secret>,
    pub openai_api_key: Option<Secret>,
}
