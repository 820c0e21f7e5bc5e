//! OpenAI-compatible chat completions backend (Together AI by default).

use std::time::Duration;

use crate::model::{
    ChatBackend, Completion, CompletionRequest, Message, ModelError, Role, ToolCallInstruction,
    Usage,
};
use crate::schema::ToolSchemaEntry;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.together.xyz/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-4-Maverick-17B-128E-Instruct-FP8";
pub const API_KEY_ENV: &str = "TOGETHER_API_KEY";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolSchemaEntry],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

fn no_tools(tools: &&[ToolSchemaEntry]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallInstruction>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl OpenAiBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Per-request HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> OpenAiBackend {
        OpenAiBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            endpoint: format!("{}/chat/completions", self.base_url.trim_end_matches('/')),
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        }
    }
}

/// Chat backend speaking the OpenAI `/chat/completions` protocol.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> OpenAiBackendBuilder {
        OpenAiBackendBuilder::new(api_key, model)
    }

    /// Create a backend from the `TOGETHER_API_KEY` environment variable.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = Self::api_key_from(API_KEY_ENV, |name| std::env::var(name).ok())?;
        Ok(Self::builder(api_key, model).build())
    }

    /// Look up the API key in variable `name`. Absent or blank is a config error.
    pub fn api_key_from(name: &str, var: impl Fn(&str) -> Option<String>) -> Result<String> {
        var(name)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{name} not set")))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn millis(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    fn response_to_completion(
        response: ApiResponse,
    ) -> std::result::Result<Completion, ModelError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("response has no choices".into()))?;

        tracing::debug!(finish_reason = ?choice.finish_reason, "completion received");

        let message = Message {
            role: Role::Assistant,
            content: choice.message.content.unwrap_or_default(),
            tool_call_id: None,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
        };
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(Completion { message, usage })
    }
}

impl std::fmt::Display for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai-compatible({}, {})", self.model, self.endpoint)
    }
}

impl ChatBackend for OpenAiBackend {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> std::result::Result<Completion, ModelError> {
        let api_request = ApiRequest {
            model: &self.model,
            messages: request.messages,
            tools: request.tools,
            max_tokens: self.max_tokens,
            stream: false,
        };

        tracing::info!(
            model = %self.model,
            tools = request.tools.len(),
            messages = request.messages.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .timeout(self.timeout)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(self.millis())
                } else {
                    ModelError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "chat service returned an error");
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let completion = Self::response_to_completion(api_response)?;
        tracing::info!(
            tool_calls = completion.message.tool_calls.len(),
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "received chat completion"
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FunctionSchema;
    use mockito::Matcher;
    use serde_json::json;

    fn scrape_schema() -> ToolSchemaEntry {
        ToolSchemaEntry {
            kind: "function".into(),
            function: FunctionSchema {
                name: "scrape_url".into(),
                description: "Fetch a page".into(),
                parameters: json!({"type": "object"}),
            },
        }
    }

    #[test]
    fn request_omits_empty_tools() {
        let messages = [Message::user("hi")];
        let request = ApiRequest {
            model: "m",
            messages: &messages,
            tools: &[],
            max_tokens: None,
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("max_tokens").is_none());
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn api_key_must_be_present_and_non_blank() {
        let vars = |name: &str| match name {
            "SET" => Some("secret".to_string()),
            "EMPTY" => Some(String::new()),
            "BLANK" => Some("  ".to_string()),
            _ => None,
        };

        assert_eq!(OpenAiBackend::api_key_from("SET", vars).unwrap(), "secret");
        for name in ["MISSING", "EMPTY", "BLANK"] {
            let err = OpenAiBackend::api_key_from(name, vars).unwrap_err();
            assert!(matches!(err, Error::Config(ref m) if m == &format!("{name} not set")));
        }
    }

    #[test]
    fn display_names_model_and_endpoint() {
        let backend = OpenAiBackend::builder("k", "llama")
            .base_url("http://localhost:8080/v1/")
            .build();
        assert_eq!(
            backend.to_string(),
            "openai-compatible(llama, http://localhost:8080/v1/chat/completions)"
        );
    }

    #[tokio::test]
    async fn parses_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "llama",
                "tools": [{"type": "function", "function": {"name": "scrape_url"}}],
                "messages": [{"role": "user", "content": "summarize https://example.com"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [{
                                "id": "call_1",
                                "type": "function",
                                "function": {
                                    "name": "scrape_url",
                                    "arguments": "{\"url\":\"https://example.com\"}"
                                }
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 7}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = OpenAiBackend::builder("test-key", "llama")
            .base_url(server.url())
            .build();
        let messages = [Message::user("summarize https://example.com")];
        let tools = [scrape_schema()];
        let completion = backend
            .complete(CompletionRequest {
                messages: &messages,
                tools: &tools,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(completion.message.content, "");
        assert_eq!(completion.message.tool_calls.len(), 1);
        assert_eq!(completion.message.tool_calls[0].id, "call_1");
        assert_eq!(
            completion.message.tool_calls[0].function.arguments,
            "{\"url\":\"https://example.com\"}"
        );
        assert_eq!(
            completion.usage,
            Usage {
                input_tokens: 12,
                output_tokens: 7
            }
        );
    }

    #[tokio::test]
    async fn parses_direct_answer() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Hello!"}}]}"#)
            .create_async()
            .await;

        let backend = OpenAiBackend::builder("k", "llama").base_url(server.url()).build();
        let messages = [Message::user("hi")];
        let completion = backend
            .complete(CompletionRequest {
                messages: &messages,
                tools: &[],
            })
            .await
            .unwrap();

        assert_eq!(completion.message.content, "Hello!");
        assert!(!completion.message.has_tool_calls());
        assert_eq!(completion.usage, Usage::default());
    }

    #[tokio::test]
    async fn error_status_becomes_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let backend = OpenAiBackend::builder("bad", "llama").base_url(server.url()).build();
        let messages = [Message::user("hi")];
        let err = backend
            .complete(CompletionRequest {
                messages: &messages,
                tools: &[],
            })
            .await
            .unwrap_err();

        match err {
            ModelError::Api(msg) => {
                assert!(msg.starts_with("401"));
                assert!(msg.contains("invalid api key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let backend = OpenAiBackend::builder("k", "llama").base_url(server.url()).build();
        let messages = [Message::user("hi")];
        let err = backend
            .complete(CompletionRequest {
                messages: &messages,
                tools: &[],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        // Nothing listens on port 9 (discard) in the test environment.
        let backend = OpenAiBackend::builder("k", "llama")
            .base_url("http://127.0.0.1:9")
            .build();
        let messages = [Message::user("hi")];
        let err = backend
            .complete(CompletionRequest {
                messages: &messages,
                tools: &[],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Network(_)));
    }
}
