mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use scout_index::{ReconcilerConfig, ScannerConfig};
use scout_llm::RetryPolicy;

use crate::error::CoreError;

/// Priority: explicit CLI path > `SCOUT_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("SCOUT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`CoreError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: &str| Err(CoreError::Config(msg.to_owned()));

        if self.index.extensions.is_empty() {
            return invalid("index.extensions must not be empty");
        }
        if self.index.max_embed_chars == 0 {
            return invalid("index.max_embed_chars must be greater than 0");
        }
        if self.index.concurrency == 0 {
            return invalid("index.concurrency must be greater than 0");
        }
        if self.index.embed_timeout_secs == 0 {
            return invalid("index.embed_timeout_secs must be greater than 0");
        }
        if self.retrieval.max_candidates == 0 {
            return invalid("retrieval.max_candidates must be greater than 0");
        }
        if self.retrieval.max_query_chars == 0 {
            return invalid("retrieval.max_query_chars must be greater than 0");
        }
        if self.llm.embedding_model.trim().is_empty() && self.llm.embedding.is_none() {
            return invalid("llm.embedding_model must not be empty");
        }
        let embeds_with = self
            .llm
            .embedding
            .as_ref()
            .map_or(self.llm.provider, |e| e.provider);
        if embeds_with == ProviderKind::Claude {
            return invalid(
                "claude has no embedding endpoint; configure [llm.embedding] with ollama or openai",
            );
        }
        if self.llm.provider == ProviderKind::OpenAi && self.llm.openai.is_none() {
            return invalid("llm.provider = \"openai\" requires an [llm.openai] section");
        }
        if self.llm.provider == ProviderKind::Claude && self.llm.cloud.is_none() {
            return invalid("llm.provider = \"claude\" requires an [llm.cloud] section");
        }
        Ok(())
    }

    /// Reconciliation settings derived from `[index]` and `[retrieval]`.
    #[must_use]
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            scanner: ScannerConfig {
                extensions: self.index.extensions.clone(),
                excluded_dirs: self.index.excluded_dirs.clone(),
                respect_gitignore: self.index.respect_gitignore,
                follow_links: self.index.follow_links,
            },
            max_embed_chars: self.index.max_embed_chars,
            concurrency: self.index.concurrency,
            retry: self.retry_policy(),
            metric: self.retrieval.metric,
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.index.embed_retries,
            timeout: Duration::from_secs(self.index.embed_timeout_secs),
            ..RetryPolicy::default()
        }
    }
}
