//! Error types for the loreweave core library.

use thiserror::Error;

/// Top-level error type for core operations.
///
/// Domain refusals (insufficient energy, invalid travel) are not errors;
/// they are returned as plain values by the operations that produce them.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, CoreError>;
