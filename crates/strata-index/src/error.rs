//! Error types for the index crate.

use std::io;
use std::path::PathBuf;

use strata_crypto::CryptoError;

/// Errors that can occur while scanning or comparing directories.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A file or directory could not be read.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Directory traversal failed.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The scan root is missing or not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Hashing or commitment failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
