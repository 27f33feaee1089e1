// apitoken: Codec error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid hash parameters: {0}")]
    Params(String),

    #[error("Hashing failed: {0}")]
    Hash(String),
}
