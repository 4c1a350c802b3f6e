//! Recursive directory hashing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path};

use strata_crypto::ContentHasher;
use strata_types::{AlgorithmId, Digest};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{IndexError, IndexResult};

/// Path components skipped by default.
pub const DEFAULT_EXCLUDES: [&str; 5] = [".git", "__pycache__", "node_modules", ".env", "target"];

/// Options for [`scan_directory`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    /// Any path with a component equal to one of these is skipped.
    pub exclude: Vec<String>,
    pub algorithm: AlgorithmId,
}

impl ScanOptions {
    pub fn with_excludes<I, S>(exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude: exclude.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        relative.components().any(|c| match c {
            Component::Normal(name) => self.exclude.iter().any(|ex| name == ex.as_str()),
            _ => false,
        })
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            algorithm: AlgorithmId::Sha256,
        }
    }
}

/// Hash a single file.
pub fn hash_file(path: &Path, algorithm: AlgorithmId) -> IndexResult<Digest> {
    let data = fs::read(path).map_err(|e| IndexError::io(path, e))?;
    Ok(ContentHasher::new(algorithm).hash(&data))
}

/// Hash every regular file under `root`.
///
/// Keys are paths relative to `root` joined with `/`, in sorted order.
/// Excluded directories are not descended into.
pub fn scan_directory(
    root: &Path,
    options: &ScanOptions,
) -> IndexResult<BTreeMap<String, Digest>> {
    if !root.is_dir() {
        return Err(IndexError::NotADirectory(root.to_path_buf()));
    }

    let relative = |entry: &DirEntry| entry.path().strip_prefix(root).map(Path::to_path_buf);
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match relative(entry) {
            Ok(rel) => !options.is_excluded(&rel),
            Err(_) => false,
        });

    let mut files = BTreeMap::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = relative(&entry) else {
            continue;
        };
        let key = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(key, hash_file(entry.path(), options.algorithm)?);
    }

    debug!(root = %root.display(), files = files.len(), "scanned directory");
    Ok(files)
}
