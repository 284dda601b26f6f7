use crate::claude::ClaudeProvider;
#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;

use crate::error::LlmError;
use crate::provider::{ChatProvider, EmbeddingProvider, Message};

#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    Claude(ClaudeProvider),
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl EmbeddingProvider for AnyProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        match self {
            Self::Ollama(p) => p.embed(text).await,
            Self::OpenAi(p) => p.embed(text).await,
            Self::Claude(_) => Err(LlmError::EmbedUnsupported {
                provider: "claude".into(),
            }),
            #[cfg(feature = "mock")]
            Self::Mock(p) => p.embed(text).await,
        }
    }

    fn embedding_model(&self) -> &str {
        match self {
            Self::Ollama(p) => p.embedding_model(),
            Self::OpenAi(p) => p.embedding_model(),
            Self::Claude(_) => "",
            #[cfg(feature = "mock")]
            Self::Mock(p) => p.embedding_model(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Ollama(p) => EmbeddingProvider::name(p),
            Self::OpenAi(p) => EmbeddingProvider::name(p),
            Self::Claude(p) => ChatProvider::name(p),
            #[cfg(feature = "mock")]
            Self::Mock(p) => EmbeddingProvider::name(p),
        }
    }
}

impl ChatProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        match self {
            Self::Ollama(p) => p.chat(messages).await,
            Self::Claude(p) => p.chat(messages).await,
            Self::OpenAi(p) => p.chat(messages).await,
            #[cfg(feature = "mock")]
            Self::Mock(p) => p.chat(messages).await,
        }
    }

    fn name(&self) -> &str {
        EmbeddingProvider::name(self)
    }
}
