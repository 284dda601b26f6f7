use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatProvider, Message, Role};
use crate::retry::send_with_retry;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_RETRIES: u32 = 3;

/// Anthropic Messages API. Chat only; Anthropic offers no embedding endpoint.
#[derive(Clone)]
pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
}

impl fmt::Debug for ClaudeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaudeProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ClaudeProvider {
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client,
            api_key,
            api_url: API_URL.into(),
            model,
            max_tokens,
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

impl ChatProvider for ClaudeProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let (system, chat_messages) = split_messages(messages);
        let body = RequestBody {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: &chat_messages,
        };

        let response = send_with_retry("claude", MAX_RETRIES, || {
            self.client
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("Claude API error {status}: {text}");
            return Err(LlmError::Api {
                provider: "claude".into(),
                status: status.as_u16(),
            });
        }

        let resp: ApiResponse = serde_json::from_str(&text)?;
        let reply: String = resp
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();

        if reply.is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: "claude".into(),
            });
        }
        Ok(reply)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "claude"
    }
}

fn split_messages(messages: &[Message]) -> (Option<String>, Vec<ApiMessage<'_>>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let chat = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| ApiMessage {
            role: if m.role == Role::Assistant {
                "assistant"
            } else {
                "user"
            },
            content: &m.content,
        })
        .collect();

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, chat)
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: &'a [ApiMessage<'a>],
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(server: &MockServer) -> ClaudeProvider {
        ClaudeProvider::new(
            reqwest::Client::new(),
            "key".into(),
            "claude-sonnet-4-5".into(),
            1024,
        )
        .with_api_url(format!("{}/v1/messages", server.uri()))
    }

    #[test]
    fn split_messages_extracts_system() {
        let messages = vec![Message::system("be terse"), Message::user("hello")];
        let (system, chat) = split_messages(&messages);
        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(chat.len(), 1);
        assert_eq!(chat[0].role, "user");
    }

    #[test]
    fn split_messages_without_system() {
        let messages = [Message::user("hello")];
        let (system, chat) = split_messages(&messages);
        assert!(system.is_none());
        assert_eq!(chat.len(), 1);
    }

    #[tokio::test]
    async fn chat_concatenates_text_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(serde_json::json!({"model": "claude-sonnet-4-5"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "src/"}, {"type": "text", "text": "main.py"}]
            })))
            .mount(&server)
            .await;

        let reply = provider(&server)
            .chat(&[Message::user("which file?")])
            .await
            .unwrap();
        assert_eq!(reply, "src/main.py");
    }

    #[tokio::test]
    async fn chat_empty_content_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": []})),
            )
            .mount(&server)
            .await;

        let result = provider(&server).chat(&[Message::user("hi")]).await;
        assert!(matches!(result, Err(LlmError::EmptyResponse { .. })));
    }

    #[tokio::test]
    async fn chat_client_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider(&server)
            .chat(&[Message::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 401, .. }));
        assert!(!err.is_retryable());
    }
}
