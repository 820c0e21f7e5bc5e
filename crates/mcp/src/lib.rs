//! Tool-provider protocol client.
//!
//! Talks JSON-RPC 2.0 to a tool provider over its stdin/stdout. Each logical
//! operation spawns its own provider process, runs the initialize handshake,
//! performs one request and tears the process down again.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ProviderConfig, ToolClient, ToolInvocationRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let client = ToolClient::new(ProviderConfig::new("python", "./scrape_mcp_server.py"));
//! let cancel = CancellationToken::new();
//!
//! for tool in client.list_tools(&cancel).await {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let mut arguments = serde_json::Map::new();
//! arguments.insert("url".into(), serde_json::json!("https://example.com"));
//! let result = client
//!     .invoke_tool(ToolInvocationRequest::new("scrape_url", arguments), &cancel)
//!     .await;
//! println!("{}", result.text);
//! # }
//! ```

mod client;
mod connection;
mod error;
mod protocol;
mod types;

#[cfg(test)]
mod testing;

pub use client::ToolClient;
pub use connection::{
    Connection, ConnectionState, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    MAX_OUTPUT_SIZE, ProviderConfig,
};
pub use error::{Error, Result, Stage};
pub use protocol::{
    CallToolResult, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    PROTOCOL_VERSION, RequestId, ServerInfo, ToolContent, WireTool,
};
pub use types::{ToolDefinition, ToolInvocationRequest, ToolInvocationResult};
