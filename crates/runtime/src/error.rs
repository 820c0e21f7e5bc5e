use thiserror::Error;

use crate::model::ModelError;

/// Runtime errors.
///
/// Tool-side variants classify `mcp` failures. A turn never raises them:
/// the tool host reports invocation failures in-band and an unreachable
/// catalog is empty. They surface through [`McpToolHost::try_catalog`] and
/// direct conversions from [`mcp::Error`].
///
/// [`McpToolHost::try_catalog`]: crate::McpToolHost::try_catalog
#[derive(Debug, Error)]
pub enum Error {
    /// Spawn, handshake or transport failure talking to the tool provider.
    #[error("tool provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider ran the tool and flagged the result as an error.
    /// Only produced by converting [`mcp::Error::ToolFailed`].
    #[error("tool failed: {0}")]
    ProviderApplication(String),

    #[error("invalid arguments for tool {tool}: {message}")]
    ArgumentParse { tool: String, message: String },

    #[error("chat service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("cancelled")]
    Cancelled,
}

impl From<mcp::Error> for Error {
    fn from(e: mcp::Error) -> Self {
        match e {
            mcp::Error::ToolFailed(message) => Self::ProviderApplication(message),
            mcp::Error::Cancelled => Self::Cancelled,
            other => Self::ProviderUnavailable(other.to_string()),
        }
    }
}

impl From<ModelError> for Error {
    fn from(e: ModelError) -> Self {
        Self::ServiceUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
