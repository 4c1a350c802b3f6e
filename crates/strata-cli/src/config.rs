use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use strata_crypto::{AlgorithmRegistry, HashChainBuilder, DEFAULT_ROTATION};
use strata_index::{ScanOptions, DEFAULT_EXCLUDES};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Layers per chain when `--depth` is not given.
    pub depth: usize,
    pub state_file: PathBuf,
    /// Algorithm identifiers, one per level, repeating.
    pub rotation: Vec<String>,
    /// Path components skipped when scanning directories.
    pub exclude: Vec<String>,
    pub node_id: u16,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            depth: 7,
            state_file: PathBuf::from("state/strata.json"),
            rotation: DEFAULT_ROTATION.iter().map(|a| a.as_str().to_string()).collect(),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            node_id: 0,
        }
    }
}

impl StrataConfig {
    /// Read the config at `path`. No path, or a path that does not exist,
    /// yields the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn registry(&self) -> anyhow::Result<AlgorithmRegistry> {
        AlgorithmRegistry::with_rotation(&self.rotation).context("invalid algorithm rotation")
    }

    pub fn chain_builder(&self) -> anyhow::Result<HashChainBuilder> {
        Ok(HashChainBuilder::new(self.registry()?))
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::with_excludes(self.exclude.iter().cloned())
    }
}
