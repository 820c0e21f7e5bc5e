//! Catalog and invocation types handed to callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::WireTool;

/// One entry of the provider's tool catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameter_schema: Value,
}

impl From<WireTool> for ToolDefinition {
    fn from(tool: WireTool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            parameter_schema: tool.input_schema,
        }
    }
}

/// A request to run one tool, consumed by a single invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationRequest {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl ToolInvocationRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Outcome of one invocation.
///
/// Transport failures and provider-reported failures both set `is_error`;
/// only the text tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub is_error: bool,
    pub text: String,
}

impl ToolInvocationResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            text: text.into(),
        }
    }
}
