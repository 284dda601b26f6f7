//! Provider construction from configuration.

use anyhow::Context;
use scout_llm::any::AnyProvider;
use scout_llm::claude::ClaudeProvider;
use scout_llm::http::default_client;
use scout_llm::ollama::OllamaProvider;
use scout_llm::openai::OpenAiProvider;

use crate::config::{Config, ProviderKind};

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Build the chat provider used for candidate selection.
///
/// # Errors
///
/// Returns an error if the provider section or its API key is missing.
pub fn create_chat_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &config.llm.base_url,
            config.llm.model.clone(),
            config.llm.embedding_model.clone(),
        ))),
        ProviderKind::Claude => {
            let cloud = config
                .llm
                .cloud
                .as_ref()
                .context("llm.cloud config section required for Claude provider")?;
            let api_key = config
                .secrets
                .claude_api_key
                .as_ref()
                .context("SCOUT_CLAUDE_API_KEY is not set")?
                .expose()
                .to_owned();
            let client = default_client().context("failed to build HTTP client")?;
            Ok(AnyProvider::Claude(ClaudeProvider::new(
                client,
                api_key,
                cloud.model.clone(),
                cloud.max_tokens,
            )))
        }
        ProviderKind::OpenAi => {
            let openai = config
                .llm
                .openai
                .as_ref()
                .context("llm.openai config section required for OpenAI provider")?;
            let client = default_client().context("failed to build HTTP client")?;
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                client,
                openai_api_key(config)?,
                openai.base_url.clone(),
                openai.model.clone(),
                openai.max_tokens,
                Some(
                    openai
                        .embedding_model
                        .clone()
                        .unwrap_or_else(|| config.llm.embedding_model.clone()),
                ),
            )))
        }
    }
}

/// Build the embedding provider: `[llm.embedding]` when present, otherwise
/// the main provider.
///
/// # Errors
///
/// Returns an error if the selected backend cannot embed or lacks an API key.
pub fn create_embedding_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let Some(embedding) = &config.llm.embedding else {
        if config.llm.provider == ProviderKind::Claude {
            anyhow::bail!("claude has no embedding endpoint; configure [llm.embedding]");
        }
        return create_chat_provider(config);
    };

    match embedding.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            embedding.base_url.as_deref().unwrap_or(&config.llm.base_url),
            config.llm.model.clone(),
            embedding.model.clone(),
        ))),
        ProviderKind::OpenAi => {
            let openai = config.llm.openai.as_ref();
            let base_url = embedding
                .base_url
                .clone()
                .or_else(|| openai.map(|o| o.base_url.clone()))
                .unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_owned());
            let client = default_client().context("failed to build HTTP client")?;
            Ok(AnyProvider::OpenAi(OpenAiProvider::new(
                client,
                openai_api_key(config)?,
                base_url,
                openai.map_or_else(|| embedding.model.clone(), |o| o.model.clone()),
                openai.map_or(0, |o| o.max_tokens),
                Some(embedding.model.clone()),
            )))
        }
        ProviderKind::Claude => {
            anyhow::bail!("claude has no embedding endpoint; choose ollama or openai")
        }
    }
}

/// Warn when a configured Ollama endpoint is unreachable. Never fails.
pub async fn warn_if_unreachable(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider
        && let Err(e) = ollama.health_check().await
    {
        tracing::warn!("{e}");
    }
}

fn openai_api_key(config: &Config) -> anyhow::Result<String> {
    Ok(config
        .secrets
        .openai_api_key
        .as_ref()
        .context("SCOUT_OPENAI_API_KEY is not set")?
        .expose()
        .to_owned())
}
