use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_crypto::HashLayer;
use strata_types::{Digest, Timestamp};
use tracing::{debug, info, warn};

use crate::error::{LogError, LogResult};

/// Everything a chain log persists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogState {
    /// Every appended layer, in append order.
    pub chain: Vec<HashLayer>,
    /// Last-known Merkle root.
    pub merkle_root: Option<Digest>,
    /// Time of the last successful append or root update.
    pub last_updated: Option<Timestamp>,
}

/// On-disk encoding of a state file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateFormat {
    /// Pretty-printed JSON.
    Json,
    /// bincode.
    Bincode,
}

impl StateFormat {
    /// `.bin` selects bincode; anything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bin") => Self::Bincode,
            _ => Self::Json,
        }
    }

    fn encode(self, state: &LogState) -> LogResult<Vec<u8>> {
        match self {
            Self::Json => serde_json::to_vec_pretty(state)
                .map_err(|e| LogError::Serialization(e.to_string())),
            Self::Bincode => {
                bincode::serialize(state).map_err(|e| LogError::Serialization(e.to_string()))
            }
        }
    }

    fn decode(self, bytes: &[u8]) -> LogResult<LogState> {
        match self {
            Self::Json => {
                serde_json::from_slice(bytes).map_err(|e| LogError::Serialization(e.to_string()))
            }
            Self::Bincode => {
                bincode::deserialize(bytes).map_err(|e| LogError::Serialization(e.to_string()))
            }
        }
    }
}

/// A [`LogState`] stored at a fixed path.
#[derive(Clone, Debug)]
pub struct StateFile {
    path: PathBuf,
    format: StateFormat,
}

impl StateFile {
    /// Format is chosen from the file extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = StateFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> StateFormat {
        self.format
    }

    /// Load the state. A missing file is an empty state; an unreadable or
    /// corrupt one is an error.
    pub fn load(&self) -> LogResult<LogState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "state file absent, starting empty");
            return Ok(LogState::default());
        }
        let bytes = fs::read(&self.path)?;
        let state = self.format.decode(&bytes)?;
        debug!(
            path = %self.path.display(),
            layers = state.chain.len(),
            "loaded state file"
        );
        Ok(state)
    }

    /// Write the state, creating parent directories as needed.
    ///
    /// The new content is written beside the target and renamed over it, so
    /// readers never observe a partial file.
    pub fn save(&self, state: &LogState) -> LogResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = self.format.encode(state)?;
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        let written = fs::write(&staging, &bytes).and_then(|()| fs::rename(&staging, &self.path));
        if let Err(err) = written {
            let _ = fs::remove_file(&staging);
            warn!(path = %self.path.display(), error = %err, "failed to save state file");
            return Err(err.into());
        }
        info!(
            path = %self.path.display(),
            layers = state.chain.len(),
            bytes = bytes.len(),
            "saved state file"
        );
        Ok(())
    }
}
