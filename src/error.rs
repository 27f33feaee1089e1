// apitoken: Top-level error types
//
// The management taxonomy (invalid input, already exists, not found, storage
// failure) plus the ambient failures of the binary. The gate never returns
// any of these: it folds every fault into a deny decision.

use thiserror::Error;

/// Top-level error type for all apitoken operations.
#[derive(Debug, Error)]
pub enum ApiTokenError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("A token for service '{0}' already exists.")]
    AlreadyExists(String),

    #[error("No token found for service '{0}'.")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] crate::store::StoreError),

    #[error("Codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ApiTokenError>;
