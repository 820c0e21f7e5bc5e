//! One conversational turn: catalog, completion, tool dispatch, final answer.

use std::time::Duration;

use mcp::ToolInvocationRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::model::{ChatBackend, Completion, CompletionRequest, Message, ToolCallInstruction};
use crate::schema::{self, ToolSchemaEntry};
use crate::tools::ToolHost;
use crate::{Error, Result};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that can scrape and summarize web content. When a user provides a URL or asks to scrape content, use the scrape_url tool. Always provide detailed summaries of the scraped content.";

/// Default bound on each chat completion call.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Caller-facing summary of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReply {
    pub response: String,
    pub tool_used: bool,
    /// Result text of the first tool invoked, or empty.
    pub tool_results: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnReply {
    fn direct(response: String) -> Self {
        Self {
            response,
            tool_used: false,
            tool_results: String::new(),
            error: None,
        }
    }

    fn with_tools(response: String, first_result: String) -> Self {
        Self {
            response,
            tool_used: true,
            tool_results: first_result,
            error: None,
        }
    }

    fn failed(error: &Error) -> Self {
        let description = error.to_string();
        Self {
            response: format!("Sorry, I encountered an error: {description}"),
            tool_used: false,
            tool_results: String::new(),
            error: Some(description),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A finished turn: the reply plus every message sent to the chat service.
#[derive(Debug, Clone)]
pub struct Turn {
    pub reply: TurnReply,
    pub transcript: Vec<Message>,
}

/// Drives turns against a chat backend and a tool host.
///
/// Holds no per-turn state; one orchestrator can serve concurrent turns.
pub struct Orchestrator<B, H> {
    backend: B,
    tools: H,
    system_prompt: String,
    completion_timeout: Duration,
}

impl<B: ChatBackend, H: ToolHost> Orchestrator<B, H> {
    pub fn new(backend: B, tools: H) -> Self {
        Self {
            backend,
            tools,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn tools(&self) -> &H {
        &self.tools
    }

    /// Answer one user message. Never fails: errors become a degraded reply.
    pub async fn respond(&self, user_message: &str, cancel: &CancellationToken) -> TurnReply {
        self.run_turn(user_message, cancel).await.reply
    }

    /// Like [`Orchestrator::respond`], also returning the transcript.
    pub async fn run_turn(&self, user_message: &str, cancel: &CancellationToken) -> Turn {
        let mut transcript = Vec::new();
        let reply = match self.drive(user_message, &mut transcript, cancel).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                TurnReply::failed(&e)
            }
        };
        Turn { reply, transcript }
    }

    async fn drive(
        &self,
        user_message: &str,
        transcript: &mut Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<TurnReply> {
        let catalog = self.tools.catalog(cancel).await;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let schema = schema::adapt(&catalog);
        tracing::info!(
            tools = ?schema.iter().map(|t| t.function.name.as_str()).collect::<Vec<_>>(),
            "available tools"
        );

        transcript.push(Message::system(self.system_prompt.as_str()));
        transcript.push(Message::user(user_message));

        let first = self.complete(transcript, &schema, cancel).await?;
        let assistant = first.message;

        if !assistant.has_tool_calls() {
            tracing::info!("no tools called, returning direct response");
            return Ok(TurnReply::direct(assistant.content));
        }

        tracing::info!(count = assistant.tool_calls.len(), "model requested tool calls");

        // Strictly sequential: each result lands in the transcript before the
        // next call is dispatched.
        let mut first_result = None;
        for call in &assistant.tool_calls {
            let arguments = parse_arguments(call)?;
            tracing::info!(tool = %call.function.name, id = %call.id, "executing tool");

            let result = self
                .tools
                .invoke(
                    ToolInvocationRequest::new(call.function.name.as_str(), arguments),
                    cancel,
                )
                .await;
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            transcript.push(Message::assistant_tool_call(
                assistant.content.as_str(),
                call.clone(),
            ));
            transcript.push(Message::tool(call.id.as_str(), result.text.as_str()));
            first_result.get_or_insert(result.text);
        }

        let last = self.complete(transcript, &[], cancel).await?;
        Ok(TurnReply::with_tools(
            last.message.content,
            first_result.unwrap_or_default(),
        ))
    }

    /// One bounded, cancellable completion call.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchemaEntry],
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        let request = CompletionRequest { messages, tools };
        let limit = self.completion_timeout;

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = tokio::time::timeout(limit, self.backend.complete(request)) => match res {
                Ok(completion) => Ok(completion?),
                Err(_) => Err(Error::ServiceUnavailable(format!(
                    "chat completion timed out after {}ms",
                    limit.as_millis()
                ))),
            },
        }
    }
}

/// Decode a tool call's serialized arguments into a JSON object.
fn parse_arguments(call: &ToolCallInstruction) -> Result<Map<String, Value>> {
    let parse_error = |message: String| Error::ArgumentParse {
        tool: call.function.name.clone(),
        message,
    };

    match serde_json::from_str::<Value>(&call.function.arguments) {
        Ok(Value::Object(arguments)) => Ok(arguments),
        Ok(other) => Err(parse_error(format!("expected a JSON object, got {other}"))),
        Err(e) => Err(parse_error(e.to_string())),
    }
}
