use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use strata_crypto::{ChainVerifier, HashLayer};
use strata_types::{Clock, Digest, HybridLogicalClock, Timestamp};
use tracing::{debug, warn};

use crate::error::{LogError, LogResult};
use crate::state::LogState;
use crate::traits::{LogReader, LogWriter};

/// In-memory chain log for tests, local tools, and embedding.
///
/// Appends take the write lock, so there is exactly one writer at a time.
pub struct InMemoryChainLog {
    clock: Arc<dyn Clock>,
    inner: RwLock<LogState>,
}

impl InMemoryChainLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_state(clock, LogState::default())
    }

    /// Start from previously persisted state.
    pub fn with_state(clock: Arc<dyn Clock>, state: LogState) -> Self {
        Self {
            clock,
            inner: RwLock::new(state),
        }
    }

    pub(crate) fn read_state(&self) -> LogResult<RwLockReadGuard<'_, LogState>> {
        self.inner.read().map_err(|_| LogError::LockPoisoned)
    }

    pub(crate) fn write_state(&self) -> LogResult<RwLockWriteGuard<'_, LogState>> {
        self.inner.write().map_err(|_| LogError::LockPoisoned)
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

impl Default for InMemoryChainLog {
    fn default() -> Self {
        Self::new(Arc::new(HybridLogicalClock::default()))
    }
}

/// Check that `chain` is a complete, internally consistent chain.
fn check_appendable(chain: &[HashLayer]) -> LogResult<()> {
    let first = chain.first().ok_or(LogError::EmptyChain)?;
    if first.level != 0 {
        return Err(LogError::IntegrityViolation {
            level: first.level,
            reason: "chain must start at level 0".into(),
        });
    }
    if first.parent_hash.is_some() {
        return Err(LogError::IntegrityViolation {
            level: 0,
            reason: "level 0 must not carry a parent hash".into(),
        });
    }

    let report = ChainVerifier::verify(chain);
    match report.violations.first() {
        None => Ok(()),
        Some(violation) => Err(LogError::IntegrityViolation {
            level: violation.level,
            reason: violation.description.clone(),
        }),
    }
}

impl LogWriter for InMemoryChainLog {
    fn append_chain(&self, chain: &[HashLayer]) -> LogResult<usize> {
        if let Err(err) = check_appendable(chain) {
            warn!(layers = chain.len(), error = %err, "rejected chain append");
            return Err(err);
        }

        let now = self.now();
        let mut state = self.write_state()?;
        let start = state.chain.len();
        state.chain.extend_from_slice(chain);
        state.last_updated = Some(now);

        debug!(
            start,
            layers = chain.len(),
            total = state.chain.len(),
            "appended chain"
        );
        Ok(start)
    }

    fn record_merkle_root(&self, root: &Digest) -> LogResult<()> {
        let now = self.now();
        let mut state = self.write_state()?;
        state.merkle_root = Some(root.clone());
        state.last_updated = Some(now);
        debug!(root = %root.short_hex(), "recorded Merkle root");
        Ok(())
    }
}

impl LogReader for InMemoryChainLog {
    fn read_all(&self) -> LogResult<Vec<HashLayer>> {
        Ok(self.read_state()?.chain.clone())
    }

    fn read_range(&self, from: usize, to: usize) -> LogResult<Vec<HashLayer>> {
        let state = self.read_state()?;
        let end = to.min(state.chain.len());
        if from >= end {
            return Ok(vec![]);
        }
        Ok(state.chain[from..end].to_vec())
    }

    fn head(&self) -> LogResult<Option<HashLayer>> {
        Ok(self.read_state()?.chain.last().cloned())
    }

    fn layer_count(&self) -> LogResult<usize> {
        Ok(self.read_state()?.chain.len())
    }

    fn merkle_root(&self) -> LogResult<Option<Digest>> {
        Ok(self.read_state()?.merkle_root.clone())
    }

    fn last_updated(&self) -> LogResult<Option<Timestamp>> {
        Ok(self.read_state()?.last_updated)
    }

    fn snapshot(&self) -> LogResult<LogState> {
        Ok(self.read_state()?.clone())
    }
}
