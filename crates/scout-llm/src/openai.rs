use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatProvider, EmbeddingProvider, Message, Role};
use crate::retry::send_with_retry;

const MAX_RETRIES: u32 = 3;

/// OpenAI (or any OpenAI-compatible endpoint) for chat completions and embeddings.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    embedding_model: Option<String>,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        mut base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            api_key,
            base_url,
            model,
            max_tokens,
            embedding_model,
        }
    }

    async fn post<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<String, LlmError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = send_with_retry("openai", MAX_RETRIES, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("OpenAI API error {status} on {endpoint}: {text}");
            return Err(LlmError::Api {
                provider: "openai".into(),
                status: status.as_u16(),
            });
        }

        Ok(text)
    }
}

impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported {
                provider: "openai".into(),
            })?;

        let body = EmbeddingRequest { input: text, model };
        let raw = self.post("embeddings", &body).await?;
        let resp: EmbeddingResponse = serde_json::from_str(&raw)?;

        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(LlmError::EmptyResponse {
                provider: "openai".into(),
            })
    }

    fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or_default()
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

impl ChatProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_messages: Vec<ApiMessage<'_>> = messages
            .iter()
            .map(|m| ApiMessage {
                role: role_str(m.role),
                content: &m.content,
            })
            .collect();
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.max_tokens,
        };

        let raw = self.post("chat/completions", &body).await?;
        let resp: ChatResponse = serde_json::from_str(&raw)?;

        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse {
                provider: "openai".into(),
            })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "openai"
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(base_url: &str, embedding_model: Option<&str>) -> OpenAiProvider {
        OpenAiProvider::new(
            reqwest::Client::new(),
            "sk-test".into(),
            base_url.into(),
            "gpt-4o-mini".into(),
            256,
            embedding_model.map(Into::into),
        )
    }

    #[tokio::test]
    async fn embed_parses_first_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "fn main() {}"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.25, -0.5, 1.0]}]
            })))
            .mount(&server)
            .await;

        let p = provider(&server.uri(), Some("text-embedding-3-small"));
        let vector = p.embed("fn main() {}").await.unwrap();
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
    }

    #[tokio::test]
    async fn embed_without_model_returns_error() {
        let p = provider("http://127.0.0.1:1", None);
        let err = p.embed("test").await.unwrap_err();
        assert!(err.to_string().contains("embedding not supported"));
    }

    #[tokio::test]
    async fn embed_empty_data_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let p = provider(&server.uri(), Some("embed"));
        assert!(matches!(
            p.embed("x").await,
            Err(LlmError::EmptyResponse { .. })
        ));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let p = provider(&server.uri(), None);
        let err = p.chat(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn chat_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "src/lib.rs"}}]
            })))
            .mount(&server)
            .await;

        let p = provider(&server.uri(), None);
        let reply = p.chat(&[Message::user("which file?")]).await.unwrap();
        assert_eq!(reply, "src/lib.rs");
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let p = provider("https://api.openai.com/v1///", None);
        assert_eq!(p.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = provider("https://api.openai.com/v1", None);
        let debug = format!("{p:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("sk-test"));
    }
}
