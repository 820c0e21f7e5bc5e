//! Chat completion service adapters.
//!
//! Each provider implements [`ChatBackend`](crate::model::ChatBackend) for its
//! specific API.

mod openai;

pub use openai::{
    API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiBackend, OpenAiBackendBuilder,
};
