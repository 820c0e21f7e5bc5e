//! Toolchat runtime: chat turns with tool calling.
//!
//! This crate wires a chat completion service to a tool provider. One user
//! message becomes one turn: fetch the provider's catalog, offer it to the
//! model, run whatever tools the model asks for and fold the results into a
//! final answer.
//!
//! # Overview
//!
//! - **ChatBackend**: a trait over chat completion services (OpenAI-compatible
//!   endpoints such as Together AI).
//! - **ToolHost**: a trait over tool providers; [`McpToolHost`] speaks the
//!   stdio protocol via the `mcp` crate.
//! - **Orchestrator**: runs a single turn and never fails outward; errors come
//!   back as a degraded [`TurnReply`].
//!
//! # Example
//!
//! ```no_run
//! use runtime::{McpToolHost, OpenAiBackend, Orchestrator, ProviderConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = OpenAiBackend::from_env(runtime::DEFAULT_MODEL)?;
//! let tools = McpToolHost::new(ProviderConfig::new("python", "./scrape_mcp_server.py"));
//! let orchestrator = Orchestrator::new(backend, tools);
//!
//! let reply = orchestrator
//!     .respond("Summarize https://example.com", &CancellationToken::new())
//!     .await;
//! println!("{}", reply.response);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod inbound;
pub mod model;
mod orchestrator;
mod providers;
pub mod schema;
mod tools;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

pub use model::{
    ChatBackend, Completion, CompletionRequest, FunctionCall, Message, ModelError, Role,
    ToolCallInstruction, Usage,
};
pub use providers::{
    API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiBackend, OpenAiBackendBuilder,
};

pub use schema::{FunctionSchema, ToolSchemaEntry};
pub use tools::{McpToolHost, ToolHost};

pub use orchestrator::{
    DEFAULT_COMPLETION_TIMEOUT, DEFAULT_SYSTEM_PROMPT, Orchestrator, Turn, TurnReply,
};

pub use inbound::{ChatRequest, InboundError, handle_chat};

// Protocol-side types that appear in this crate's API
pub use mcp::{ProviderConfig, ToolDefinition, ToolInvocationRequest, ToolInvocationResult};
