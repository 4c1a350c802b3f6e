use crate::chain::Violation;

/// Errors from hashing and commitment operations.
///
/// Time-lock verification has its own staged error type,
/// [`TimeLockError`](crate::timelock::TimeLockError).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("algorithm rotation must contain at least one algorithm")]
    EmptyRotation,

    #[error("chain depth must be between 1 and {max}, got {requested}")]
    InvalidDepth { requested: usize, max: usize },

    #[error("item not found in Merkle tree")]
    ItemNotFound,

    #[error("chain failed verification with {} violation(s)", violations.len())]
    StructuralViolation { violations: Vec<Violation> },

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
