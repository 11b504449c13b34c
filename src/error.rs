/// Error types for backend fetches
use thiserror::Error;

/// Errors surfaced by the fetch gateway and recorded on cache nodes.
///
/// Cloneable because a failure is both returned to the caller that
/// triggered the fetch and stored as the node's `Failed` status for
/// later inspection by the rendering layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Network failure, timeout, or non-2xx response
    #[error("transport error: {0}")]
    Transport(String),

    /// Response arrived but could not be interpreted
    #[error("malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        FetchError::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        FetchError::Decode(err.to_string())
    }
}
