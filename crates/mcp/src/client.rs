//! Stateless tool client: one fresh connection per operation.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::connection::{Connection, ProviderConfig};
use crate::error::{Error, Result};
use crate::types::{ToolDefinition, ToolInvocationRequest, ToolInvocationResult};

/// Client for a tool provider.
///
/// Holds only launch configuration. Every call opens its own
/// [`Connection`] and closes it before returning, so concurrent calls never
/// share a process or a buffer.
#[derive(Debug, Clone)]
pub struct ToolClient {
    config: ProviderConfig,
}

impl ToolClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Fetch the catalog, reporting why it could not be fetched.
    pub async fn try_list_tools(&self, cancel: &CancellationToken) -> Result<Vec<ToolDefinition>> {
        let mut conn = Connection::open(&self.config, cancel).await?;
        let outcome = conn.list_tools().await;
        conn.close().await;

        let mut seen = HashSet::new();
        let tools: Vec<ToolDefinition> = outcome?
            .into_iter()
            .filter(|tool| {
                let fresh = seen.insert(tool.name.clone());
                if !fresh {
                    tracing::warn!(
                        tool = %tool.name,
                        "duplicate tool name in catalog, keeping first"
                    );
                }
                fresh
            })
            .map(ToolDefinition::from)
            .collect();

        tracing::info!(
            count = tools.len(),
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "fetched tool catalog"
        );
        Ok(tools)
    }

    /// Fetch the catalog; any failure yields an empty catalog.
    ///
    /// The cause is logged at `warn`. Use [`ToolClient::try_list_tools`] when
    /// an outage must be told apart from an empty provider.
    pub async fn list_tools(&self, cancel: &CancellationToken) -> Vec<ToolDefinition> {
        match self.try_list_tools(cancel).await {
            Ok(tools) => tools,
            Err(e) => {
                tracing::warn!(error = %e, "tool catalog unavailable, continuing without tools");
                Vec::new()
            }
        }
    }

    /// Invoke a tool, returning its text or the reason it failed.
    ///
    /// A result the provider flags as an error becomes [`Error::ToolFailed`].
    pub async fn try_invoke_tool(
        &self,
        request: ToolInvocationRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let ToolInvocationRequest {
            tool_name,
            arguments,
        } = request;

        let mut conn = Connection::open(&self.config, cancel).await?;
        tracing::info!(tool = %tool_name, ?arguments, "calling tool");
        let outcome = conn.call_tool(&tool_name, arguments).await;
        conn.close().await;

        let result = outcome?;
        if result.is_error {
            let message = result.first_text().unwrap_or("Unknown error").to_string();
            tracing::error!(tool = %tool_name, error = %message, "tool reported an error");
            return Err(Error::ToolFailed(message));
        }

        let text = result.first_text().unwrap_or("No result").to_string();
        tracing::info!(tool = %tool_name, chars = text.chars().count(), "tool returned");
        Ok(text)
    }

    /// Invoke a tool; failures come back in-band with `is_error` set.
    pub async fn invoke_tool(
        &self,
        request: ToolInvocationRequest,
        cancel: &CancellationToken,
    ) -> ToolInvocationResult {
        let tool_name = request.tool_name.clone();
        match self.try_invoke_tool(request, cancel).await {
            Ok(text) => ToolInvocationResult::success(text),
            Err(Error::ToolFailed(message)) => {
                ToolInvocationResult::error(format!("Error: {message}"))
            }
            Err(e) => {
                tracing::error!(tool = %tool_name, error = %e, "failed to call tool");
                ToolInvocationResult::error(format!("Error calling tool: {e}"))
            }
        }
    }
}
