//! Narration transport error types.

use thiserror::Error;

/// Errors that terminate a narration request.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// HTTP request could not be sent.
    #[error("Narration request failed: {0}")]
    RequestFailed(String),

    /// The service answered with a non-success status.
    #[error("Narration service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if it could be read.
        body: String,
    },

    /// Request timed out.
    #[error("Narration request timed out")]
    Timeout,

    /// The service could not be reached.
    #[error("Narration service unavailable: {0}")]
    Unavailable(String),

    /// The response channel broke off mid-stream.
    #[error("Narration stream aborted: {0}")]
    StreamAborted(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Unavailable(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::StreamAborted(err.to_string())
        } else {
            TransportError::RequestFailed(err.to_string())
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, TransportError>;
