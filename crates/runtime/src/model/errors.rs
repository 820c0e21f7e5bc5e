use thiserror::Error;

/// Errors from chat completion calls.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A network error occurred during the API call.
    #[error("network: {0}")]
    Network(String),

    /// The chat service returned an error response.
    #[error("provider api: {0}")]
    Api(String),

    /// The service response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The service did not answer in time.
    #[error("timed out after {0}ms")]
    Timeout(u64),
}
