use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use strata_crypto::HashLayer;
use strata_types::{Clock, Digest, Timestamp};
use tracing::warn;

use crate::error::{LogError, LogResult};
use crate::memory::InMemoryChainLog;
use crate::state::{LogState, StateFile};
use crate::traits::{LogReader, LogWriter};

/// Chain log that rewrites its state file after every successful write.
pub struct PersistentChainLog {
    log: InMemoryChainLog,
    file: StateFile,
    /// Held across mutate-then-save so file writes land in append order.
    writer: Mutex<()>,
}

impl PersistentChainLog {
    /// Open the log at `path`, loading any existing state.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> LogResult<Self> {
        let file = StateFile::new(path);
        let state = file.load()?;
        Ok(Self {
            log: InMemoryChainLog::with_state(clock, state),
            file,
            writer: Mutex::new(()),
        })
    }

    pub fn state_file(&self) -> &StateFile {
        &self.file
    }

    /// Apply `mutate` to the in-memory log and save the result. If the save
    /// fails, the in-memory log is put back as it was.
    fn commit<T>(&self, mutate: impl FnOnce(&InMemoryChainLog) -> LogResult<T>) -> LogResult<T> {
        let _guard = self.writer.lock().map_err(|_| LogError::LockPoisoned)?;
        let previous = self.log.snapshot()?;
        let out = mutate(&self.log)?;
        let saved = self.log.snapshot().and_then(|state| self.file.save(&state));
        if let Err(err) = saved {
            warn!(path = %self.file.path().display(), error = %err, "rolling back unsaved write");
            *self.log.write_state()? = previous;
            return Err(err);
        }
        Ok(out)
    }
}

impl LogWriter for PersistentChainLog {
    fn append_chain(&self, chain: &[HashLayer]) -> LogResult<usize> {
        self.commit(|log| log.append_chain(chain))
    }

    fn record_merkle_root(&self, root: &Digest) -> LogResult<()> {
        self.commit(|log| log.record_merkle_root(root))
    }
}

impl LogReader for PersistentChainLog {
    fn read_all(&self) -> LogResult<Vec<HashLayer>> {
        self.log.read_all()
    }

    fn read_range(&self, from: usize, to: usize) -> LogResult<Vec<HashLayer>> {
        self.log.read_range(from, to)
    }

    fn head(&self) -> LogResult<Option<HashLayer>> {
        self.log.head()
    }

    fn layer_count(&self) -> LogResult<usize> {
        self.log.layer_count()
    }

    fn merkle_root(&self) -> LogResult<Option<Digest>> {
        self.log.merkle_root()
    }

    fn last_updated(&self) -> LogResult<Option<Timestamp>> {
        self.log.last_updated()
    }

    fn snapshot(&self) -> LogResult<LogState> {
        self.log.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use strata_crypto::HashChainBuilder;
    use strata_types::FixedClock;

    use super::*;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::at_millis(1_700_000_000_000))
    }

    fn chain(content: &[u8]) -> Vec<HashLayer> {
        HashChainBuilder::default()
            .build_chain(content, 3, &*clock(), None)
            .unwrap()
    }

    #[test]
    fn appends_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/strata.json");

        {
            let log = PersistentChainLog::open(&path, clock()).unwrap();
            log.append_chain(&chain(b"first")).unwrap();
            log.record_merkle_root(&Digest::from_bytes(vec![1u8; 32])).unwrap();
        }

        let reopened = PersistentChainLog::open(&path, clock()).unwrap();
        assert_eq!(reopened.layer_count().unwrap(), 3);
        assert_eq!(
            reopened.merkle_root().unwrap(),
            Some(Digest::from_bytes(vec![1u8; 32]))
        );
        reopened.append_chain(&chain(b"second")).unwrap();
        assert_eq!(StateFile::new(&path).load().unwrap().chain.len(), 6);
    }

    #[test]
    fn bincode_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.bin");
        let log = PersistentChainLog::open(&path, clock()).unwrap();
        log.append_chain(&chain(b"binary")).unwrap();

        let reopened = PersistentChainLog::open(&path, clock()).unwrap();
        assert_eq!(reopened.read_all().unwrap(), log.read_all().unwrap());
    }

    #[test]
    fn rejected_append_does_not_touch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.json");
        let log = PersistentChainLog::open(&path, clock()).unwrap();
        assert!(log.append_chain(&[]).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn failed_save_rolls_back_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.json");
        let log = PersistentChainLog::open(&path, clock()).unwrap();
        // A directory at the target path makes the final rename fail.
        fs::create_dir(&path).unwrap();

        assert!(log.append_chain(&chain(b"lost")).is_err());
        assert_eq!(log.layer_count().unwrap(), 0);
        assert_eq!(log.last_updated().unwrap(), None);
        assert!(log.record_merkle_root(&Digest::from_bytes(vec![2u8; 32])).is_err());
        assert_eq!(log.merkle_root().unwrap(), None);
        assert!(!dir.path().join("strata.json.tmp").exists());

        fs::remove_dir(&path).unwrap();
        log.append_chain(&chain(b"kept")).unwrap();
        assert_eq!(log.layer_count().unwrap(), 3);
        let saved = StateFile::new(&path).load().unwrap();
        assert_eq!(saved.chain.len(), 3);
        assert_eq!(saved.merkle_root, None);
    }

    #[test]
    fn corrupt_state_refuses_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.json");
        fs::write(&path, b"[1, 2").unwrap();
        let result = PersistentChainLog::open(&path, clock());
        assert!(matches!(result, Err(LogError::Serialization(_))));
        assert_eq!(fs::read(&path).unwrap(), b"[1, 2");
    }
}
