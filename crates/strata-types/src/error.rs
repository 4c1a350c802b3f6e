use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
