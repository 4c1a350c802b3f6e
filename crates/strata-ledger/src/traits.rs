use strata_crypto::HashLayer;
use strata_types::{Digest, Timestamp};

use crate::error::LogResult;
use crate::state::LogState;

/// Write boundary for chain log appends.
///
/// Implementations serialize writers; a chain is either appended whole or
/// not at all.
pub trait LogWriter: Send + Sync {
    /// Append a complete chain. Returns the log index of its first layer.
    fn append_chain(&self, chain: &[HashLayer]) -> LogResult<usize>;

    /// Remember the most recent Merkle root.
    fn record_merkle_root(&self, root: &Digest) -> LogResult<()>;
}

/// Read boundary for chain log queries.
pub trait LogReader: Send + Sync {
    fn read_all(&self) -> LogResult<Vec<HashLayer>>;

    /// Layers in `[from, to)`, clamped to the log length.
    fn read_range(&self, from: usize, to: usize) -> LogResult<Vec<HashLayer>>;

    fn head(&self) -> LogResult<Option<HashLayer>>;

    fn layer_count(&self) -> LogResult<usize>;

    fn merkle_root(&self) -> LogResult<Option<Digest>>;

    fn last_updated(&self) -> LogResult<Option<Timestamp>>;

    /// A copy of the full persisted state.
    fn snapshot(&self) -> LogResult<LogState>;
}
