use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Maps text to a fixed-dimension vector.
///
/// Implementations perform one network round-trip per call and do not cap the
/// input themselves; callers own the truncation policy.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text` into a vector whose dimension is fixed by the backing model.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable, rejects the input, or
    /// does not support embeddings.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Identifier of the embedding model, recorded alongside stored vectors.
    fn embedding_model(&self) -> &str;

    fn name(&self) -> &str;
}

/// Text-generation capability used to pick one file out of a candidate list.
pub trait ChatProvider: Send + Sync {
    /// Send messages to the model and return the assistant response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;

    fn name(&self) -> &str;
}
