//! Tool host backed by a stdio tool provider.

use super::ToolHost;
use crate::Result;
use mcp::{ProviderConfig, ToolClient, ToolDefinition, ToolInvocationRequest, ToolInvocationResult};
use tokio_util::sync::CancellationToken;

/// Tool host that spawns a fresh provider process for every operation.
///
/// The catalog is not cached; each call to [`ToolHost::catalog`] refetches it.
#[derive(Debug, Clone)]
pub struct McpToolHost {
    client: ToolClient,
}

impl McpToolHost {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: ToolClient::new(config),
        }
    }

    pub fn client(&self) -> &ToolClient {
        &self.client
    }

    /// Fetch the catalog, keeping provider outages distinguishable.
    pub async fn try_catalog(&self, cancel: &CancellationToken) -> Result<Vec<ToolDefinition>> {
        Ok(self.client.try_list_tools(cancel).await?)
    }
}

impl ToolHost for McpToolHost {
    async fn catalog(&self, cancel: &CancellationToken) -> Vec<ToolDefinition> {
        self.client.list_tools(cancel).await
    }

    async fn invoke(
        &self,
        request: ToolInvocationRequest,
        cancel: &CancellationToken,
    ) -> ToolInvocationResult {
        self.client.invoke_tool(request, cancel).await
    }
}
