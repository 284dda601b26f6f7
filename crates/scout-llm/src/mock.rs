//! Test-only mock provider.
//!
//! Embeddings are derived deterministically from the input bytes unless an
//! explicit vector is registered for the exact text. Every `embed` call is
//! counted, including failed ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{ChatProvider, EmbeddingProvider, Message};

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    embed_calls: Arc<AtomicUsize>,
    fixed_embeddings: Arc<HashMap<String, Vec<f32>>>,
    pub default_response: String,
    pub dimension: usize,
    pub model: String,
    /// Embedding fails for any text containing one of these markers.
    pub fail_markers: Vec<String>,
    pub fail_chat: bool,
    /// Reject empty input the way hosted embedding APIs do (status 400).
    pub reject_empty: bool,
    /// Milliseconds to sleep before returning an embedding.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            fixed_embeddings: Arc::new(HashMap::new()),
            default_response: "mock response".into(),
            dimension: 8,
            model: "mock-embed".into(),
            fail_markers: Vec::new(),
            fail_chat: false,
            reject_empty: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embeddings(mut self, embeddings: HashMap<String, Vec<f32>>) -> Self {
        self.fixed_embeddings = Arc::new(embeddings);
        self
    }

    #[must_use]
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.push(marker.into());
        self
    }

    #[must_use]
    pub fn rejecting_empty_input(mut self) -> Self {
        self.reject_empty = true;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Number of `embed` calls made through this provider and all of its clones.
    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.embed_calls.store(0, Ordering::SeqCst);
    }

    fn derive_embedding(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension.max(1)];
        let len = vector.len();
        for (i, byte) in text.bytes().enumerate() {
            vector[(usize::from(byte) + i) % len] += 1.0;
        }
        vector
    }
}

impl EmbeddingProvider for MockProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.reject_empty && text.is_empty() {
            return Err(LlmError::Api {
                provider: "mock".into(),
                status: 400,
            });
        }
        if self.fail_markers.iter().any(|m| text.contains(m.as_str())) {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        if let Some(fixed) = self.fixed_embeddings.get(text) {
            return Ok(fixed.clone());
        }
        Ok(self.derive_embedding(text))
    }

    fn embedding_model(&self) -> &str {
        &self.model
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

impl ChatProvider for MockProvider {
    async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self
            .responses
            .lock()
            .map_err(|e| LlmError::Other(e.to_string()))?;
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
