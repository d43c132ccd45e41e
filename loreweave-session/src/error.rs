//! Session and store error types.

use loreweave_stream::TransportError;
use thiserror::Error;

/// Errors raised by a [`crate::store::StateStore`].
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The store refused a write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by a [`crate::GameSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The narration request failed. The fallback line has been appended.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, SessionError>;
