use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("{provider} API returned status {status}")]
    Api { provider: String, status: u16 },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: String },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether a retry of the same request may succeed.
    ///
    /// Unsupported capabilities and malformed payloads fail the same way every time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited | Self::Timeout { .. } | Self::Other(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 408,
            Self::Json(_) | Self::EmptyResponse { .. } | Self::EmbedUnsupported { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
