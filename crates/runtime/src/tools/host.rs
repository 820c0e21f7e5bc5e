//! Tool host trait.

use mcp::{ToolDefinition, ToolInvocationRequest, ToolInvocationResult};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Trait for tool execution hosts.
///
/// Neither method fails: an unreachable catalog is an empty catalog, and
/// invocation failures come back in-band as error results.
pub trait ToolHost: Send + Sync {
    /// Fetch the current tool catalog.
    fn catalog(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Vec<ToolDefinition>> + Send;

    /// Execute one tool invocation.
    fn invoke(
        &self,
        request: ToolInvocationRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = ToolInvocationResult> + Send;
}
