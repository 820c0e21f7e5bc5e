//! Tool hosts: the seam between the orchestrator and tool execution.

mod host;
mod mcp_host;

pub use host::ToolHost;
pub use mcp_host::McpToolHost;
