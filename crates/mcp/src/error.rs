//! Protocol client error types.

use std::path::PathBuf;

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Connection stage a timeout fired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Handshake,
    Request,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handshake => write!(f, "handshake"),
            Self::Request => write!(f, "request"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("tool provider entry point not found: {}", .0.display())]
    EntryPointMissing(PathBuf),

    #[error("failed to spawn tool provider: {0}")]
    Spawn(std::io::Error),

    #[error("tool provider stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timeout during {stage} after {millis}ms")]
    Timeout { stage: Stage, millis: u64 },

    #[error("tool provider exited unexpectedly")]
    ServerExited,

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to encode message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("output too large: {size} bytes (max {max})")]
    OutputTooLarge { size: usize, max: usize },

    /// The provider ran the tool and flagged the result as an error.
    #[error("{0}")]
    ToolFailed(String),
}

impl Error {
    /// True when the provider could not be reached or spoken to.
    ///
    /// Everything except [`Error::ToolFailed`] is a transport-level failure.
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::ToolFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
