//! Tool schema adapter: catalog entries to chat-service tool declarations.

use mcp::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool declaration in the `{type: "function", function: {...}}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchemaEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDefinition> for ToolSchemaEntry {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSchema {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameter_schema.clone(),
            },
        }
    }
}

/// Wrap every definition, in catalog order. Schemas pass through unvalidated.
pub fn adapt(catalog: &[ToolDefinition]) -> Vec<ToolSchemaEntry> {
    catalog.iter().map(ToolSchemaEntry::from).collect()
}
