//! Chat-completion client for the Groq OpenAI-compatible endpoint.
//!
//! One hosted text-generation endpoint, selected by a single credential. The model name
//! comes from configuration and the temperature is fixed. A completion may either carry
//! assistant text or declare tool calls the caller is expected to execute.

use crate::config::get_config;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const TEMPERATURE: f32 = 0.7;

/// Errors returned while talking to the chat endpoint.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Endpoint responded with an unexpected status code.
    #[error("Unexpected chat response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the endpoint.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Response carried neither content nor tool calls.
    #[error("Chat response contained no choices")]
    EmptyResponse,
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user or agent prompt.
    User,
}

/// One message in a chat exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Declaration of a callable tool, in the endpoint's function schema.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    /// Tool name the model will use to request an invocation.
    pub name: &'static str,
    /// Human-readable description shown to the model.
    pub description: &'static str,
    /// JSON schema of the accepted arguments.
    pub parameters: Value,
}

/// A model-declared request to invoke an external tool.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Identifier assigned by the endpoint.
    pub id: String,
    /// Name of the requested tool.
    pub name: String,
    /// Raw JSON arguments string supplied by the model.
    pub arguments: String,
}

/// Result of a single completion call.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    /// Assistant text, when the model answered directly.
    pub content: Option<String>,
    /// Declared tool calls, when the model requested execution first.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatOutcome {
    /// Assistant text or an empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// HTTP client for the chat-completion endpoint.
pub struct ChatClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
}

impl ChatClient {
    /// Construct a client from the loaded configuration.
    pub fn new() -> Result<Self, ChatError> {
        let config = get_config();
        let client = reqwest::Client::builder()
            .user_agent("fournil/0.1")
            .build()?;
        Ok(Self {
            client,
            base_url: config
                .groq_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: config.groq_api_key.clone(),
            model: config.groq_model.clone(),
        })
    }

    /// Issue one completion call, optionally advertising tools the model may request.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
    ) -> Result<ChatOutcome, ChatError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": TEMPERATURE,
        });

        if let Some(tools) = tools.filter(|tools| !tools.is_empty()) {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body.as_object_mut()
                .expect("request body is an object")
                .insert("tools".into(), Value::Array(declarations));
        }

        tracing::debug!(model = %self.model, with_tools = tools.is_some(), "Chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = ChatError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Chat completion failed");
            return Err(error);
        }

        let payload: CompletionResponse = response.json().await?;
        let choice = payload
            .choices
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyResponse)?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(ChatOutcome {
            content: choice.message.content,
            tool_calls,
        })
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<RawToolCall>>,
}

#[derive(Deserialize)]
struct RawToolCall {
    id: String,
    function: RawToolFunction,
}

#[derive(Deserialize)]
struct RawToolFunction {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_client(server: &MockServer) -> ChatClient {
        ChatClient {
            client: reqwest::Client::builder()
                .user_agent("fournil-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: "test-key".into(),
            model: "llama-3.1-8b-instant".into(),
        }
    }

    #[tokio::test]
    async fn complete_returns_assistant_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer test-key")
                    .json_body_partial(r#"{ "model": "llama-3.1-8b-instant" }"#);
                then.status(200).json_body(serde_json::json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "A brioche proposal." } }
                    ]
                }));
            })
            .await;

        let client = test_client(&server);
        let outcome = client
            .complete(&[ChatMessage::user("Propose a brioche")], None)
            .await
            .expect("completion");

        mock.assert();
        assert_eq!(outcome.text(), "A brioche proposal.");
        assert!(outcome.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn complete_surfaces_declared_tool_calls() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(serde_json::json!({
                    "choices": [
                        {
                            "message": {
                                "role": "assistant",
                                "content": null,
                                "tool_calls": [
                                    {
                                        "id": "call-1",
                                        "type": "function",
                                        "function": {
                                            "name": "price_search",
                                            "arguments": "{\"query\": \"butter price per kg\"}"
                                        }
                                    }
                                ]
                            }
                        }
                    ]
                }));
            })
            .await;

        let client = test_client(&server);
        let tools = [ToolSpec {
            name: "price_search",
            description: "Look up prices",
            parameters: serde_json::json!({ "type": "object" }),
        }];
        let outcome = client
            .complete(&[ChatMessage::user("Cost this recipe")], Some(&tools))
            .await
            .expect("completion");

        assert!(outcome.content.is_none());
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].name, "price_search");
        assert!(outcome.tool_calls[0].arguments.contains("butter"));
    }

    #[tokio::test]
    async fn complete_maps_http_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(401).body("invalid key");
            })
            .await;

        let client = test_client(&server);
        let error = client
            .complete(&[ChatMessage::user("hi")], None)
            .await
            .unwrap_err();
        assert!(matches!(error, ChatError::UnexpectedStatus { .. }));
    }

    #[tokio::test]
    async fn complete_rejects_empty_choice_list() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .json_body(serde_json::json!({ "choices": [] }));
            })
            .await;

        let client = test_client(&server);
        let error = client
            .complete(&[ChatMessage::user("hi")], None)
            .await
            .unwrap_err();
        assert!(matches!(error, ChatError::EmptyResponse));
    }
}
