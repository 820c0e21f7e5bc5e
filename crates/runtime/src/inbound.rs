//! Inbound boundary: validates a chat request before any turn starts.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::ChatBackend;
use crate::orchestrator::{Orchestrator, TurnReply};
use crate::tools::ToolHost;

/// Body of an inbound chat request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Parse a JSON request body.
    pub fn from_json(body: &str) -> Result<Self, InboundError> {
        serde_json::from_str(body).map_err(|e| InboundError::Malformed(e.to_string()))
    }
}

/// Client-side errors; the only failures the boundary surfaces.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("No message provided")]
    EmptyMessage,

    #[error("malformed request: {0}")]
    Malformed(String),
}

impl InboundError {
    /// HTTP-equivalent status code.
    pub fn status(&self) -> u16 {
        400
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handle one inbound chat request.
///
/// An empty or missing message is rejected before the orchestrator runs, so
/// neither the chat service nor the tool provider is contacted.
pub async fn handle_chat<B: ChatBackend, H: ToolHost>(
    orchestrator: &Orchestrator<B, H>,
    request: ChatRequest,
    cancel: &CancellationToken,
) -> Result<TurnReply, InboundError> {
    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or(InboundError::EmptyMessage)?;

    let preview: String = message.chars().take(100).collect();
    tracing::info!(message = %preview, "processing chat message");

    Ok(orchestrator.respond(&message, cancel).await)
}
