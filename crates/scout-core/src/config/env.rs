use std::path::PathBuf;

use super::{Config, Secret};

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_index();
        self.apply_env_overrides_retrieval();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("SCOUT_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid SCOUT_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("SCOUT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("SCOUT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("SCOUT_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("SCOUT_SQLITE_PATH") {
            self.index.sqlite_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SCOUT_INDEX_EXTENSIONS") {
            self.index.extensions = split_list(&v);
        }
        if let Ok(v) = std::env::var("SCOUT_INDEX_EXCLUDED_DIRS") {
            self.index.excluded_dirs = split_list(&v);
        }
        if let Ok(v) = std::env::var("SCOUT_INDEX_RESPECT_GITIGNORE")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.index.respect_gitignore = enabled;
        }
        if let Ok(v) = std::env::var("SCOUT_INDEX_FOLLOW_LINKS")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.index.follow_links = enabled;
        }
        if let Ok(v) = std::env::var("SCOUT_INDEX_MAX_EMBED_CHARS")
            && let Ok(chars) = v.parse::<usize>()
        {
            self.index.max_embed_chars = chars;
        }
        if let Ok(v) = std::env::var("SCOUT_INDEX_CONCURRENCY")
            && let Ok(n) = v.parse::<usize>()
        {
            self.index.concurrency = n;
        }
        if let Ok(v) = std::env::var("SCOUT_INDEX_EMBED_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.index.embed_timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("SCOUT_INDEX_EMBED_RETRIES")
            && let Ok(n) = v.parse::<u32>()
        {
            self.index.embed_retries = n;
        }
    }

    fn apply_env_overrides_retrieval(&mut self) {
        if let Ok(v) = std::env::var("SCOUT_RETRIEVAL_MAX_CANDIDATES")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.max_candidates = n;
        }
        if let Ok(v) = std::env::var("SCOUT_RETRIEVAL_MAX_QUERY_CHARS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.max_query_chars = n;
        }
        if let Ok(v) = std::env::var("SCOUT_RETRIEVAL_METRIC") {
            match v.parse() {
                Ok(metric) => self.retrieval.metric = metric,
                Err(_) => tracing::warn!("ignoring invalid SCOUT_RETRIEVAL_METRIC value: {v}"),
            }
        }
    }

    /// Read API keys from `SCOUT_CLAUDE_API_KEY` and `SCOUT_OPENAI_API_KEY`.
    pub fn resolve_secrets(&mut self) {
        if let Ok(val) = std::env::var("SCOUT_CLAUDE_API_KEY") {
            self.secrets.claude_api_key = Some(Secret::new(val));
        }
        if let Ok(val) = std::env::var("SCOUT_OPENAI_API_KEY") {
            self.secrets.openai_api_key = Some(Secret::new(val));
        }
    }
}
