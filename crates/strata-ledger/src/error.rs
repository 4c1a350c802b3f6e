use std::io;

use strata_crypto::CryptoError;

/// Errors produced by chain log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("integrity violation at level {level}: {reason}")]
    IntegrityViolation { level: u32, reason: String },

    #[error("cannot append an empty chain")]
    EmptyChain,

    #[error("task not found in attestation registry: {0}")]
    TaskNotFound(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("chain log lock poisoned")]
    LockPoisoned,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub type LogResult<T> = Result<T, LogError>;
