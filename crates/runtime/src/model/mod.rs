//! Chat completion contract types and backend trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    ChatBackend, Completion, CompletionRequest, FunctionCall, Message, Role, ToolCallInstruction,
    Usage,
};
