//! External capabilities consumed by the scout index: text embedding and
//! chat-based candidate selection, with Ollama, OpenAI-compatible, and Claude backends.

pub mod any;
pub mod claude;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod retry;

pub use error::LlmError;
pub use provider::{ChatProvider, EmbeddingProvider, Message, Role};
pub use retry::{RetryPolicy, call_with_retry};
