//! File manifests and manifest comparison.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_crypto::ContentHasher;
use strata_types::{Digest, Timestamp};
use tracing::{debug, warn};

use crate::error::{IndexError, IndexResult};
use crate::scan::{scan_directory, ScanOptions};

pub const MANIFEST_VERSION: &str = "1.0";

/// Snapshot of every file digest under a directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    /// RFC 3339 generation time.
    pub generated: String,
    pub directory: String,
    pub file_count: usize,
    pub files: BTreeMap<String, Digest>,
    /// SHA-256 of the compact JSON encoding of `files`.
    pub manifest_hash: Digest,
}

impl Manifest {
    /// Build a manifest from already-hashed files.
    pub fn from_files(
        directory: impl Into<String>,
        files: BTreeMap<String, Digest>,
        generated: Timestamp,
    ) -> IndexResult<Self> {
        let manifest_hash = files_digest(&files)?;
        Ok(Self {
            version: MANIFEST_VERSION.to_string(),
            generated: generated.to_rfc3339(),
            directory: directory.into(),
            file_count: files.len(),
            files,
            manifest_hash,
        })
    }

    /// Scan `dir` and build its manifest.
    pub fn generate(dir: &Path, options: &ScanOptions, now: Timestamp) -> IndexResult<Self> {
        let files = scan_directory(dir, options)?;
        Self::from_files(dir.display().to_string(), files, now)
    }

    /// Recompute `manifest_hash` from `files`.
    pub fn verify_hash(&self) -> IndexResult<bool> {
        let digest = files_digest(&self.files)?;
        Ok(digest == self.manifest_hash && self.file_count == self.files.len())
    }

    pub fn save(&self, path: &Path) -> IndexResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        fs::write(path, json).map_err(|e| IndexError::io(path, e))?;
        debug!(path = %path.display(), files = self.file_count, "saved manifest");
        Ok(())
    }

    pub fn load(path: &Path) -> IndexResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        let manifest: Self =
            serde_json::from_str(&text).map_err(|e| IndexError::Serialization(e.to_string()))?;
        if !manifest.verify_hash()? {
            warn!(path = %path.display(), "manifest hash does not match its file list");
        }
        Ok(manifest)
    }

    /// Compare this manifest against the current contents of `dir`.
    pub fn check(&self, dir: &Path, options: &ScanOptions) -> IndexResult<ManifestDiff> {
        let current = scan_directory(dir, options)?;
        Ok(compare(&self.files, &current))
    }
}

fn files_digest(files: &BTreeMap<String, Digest>) -> IndexResult<Digest> {
    Ok(ContentHasher::SHA256.hash_json(files)?)
}

/// Path-level differences between a stored and a current file map.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ManifestDiff {
    /// New files are tolerated; anything removed or changed is not.
    pub fn is_valid(&self) -> bool {
        self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Classify every path in either map. Each list is sorted.
pub fn compare(
    stored: &BTreeMap<String, Digest>,
    current: &BTreeMap<String, Digest>,
) -> ManifestDiff {
    let paths: BTreeSet<&String> = stored.keys().chain(current.keys()).collect();
    let mut diff = ManifestDiff::default();
    for path in paths {
        match (stored.get(path), current.get(path)) {
            (None, Some(_)) => diff.added.push(path.clone()),
            (Some(_), None) => diff.removed.push(path.clone()),
            (Some(a), Some(b)) if a != b => diff.modified.push(path.clone()),
            _ => diff.unchanged.push(path.clone()),
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, Digest> {
        entries
            .iter()
            .map(|(p, c)| (p.to_string(), ContentHasher::SHA256.hash(c.as_bytes())))
            .collect()
    }

    #[test]
    fn manifest_hash_is_sha256_of_compact_files_json() {
        let files = files(&[("b.txt", "b"), ("a.txt", "a")]);
        let expected = format!(
            r#"{{"a.txt":"{}","b.txt":"{}"}}"#,
            files["a.txt"].to_hex(),
            files["b.txt"].to_hex()
        );
        let manifest = Manifest::from_files("dir", files, Timestamp::from_millis(0)).unwrap();
        assert_eq!(manifest.version, "1.0");
        assert_eq!(manifest.file_count, 2);
        assert_eq!(manifest.generated, "1970-01-01T00:00:00.000Z");
        assert_eq!(
            manifest.manifest_hash,
            ContentHasher::SHA256.hash(expected.as_bytes())
        );
        assert!(manifest.verify_hash().unwrap());
    }

    #[test]
    fn compare_classifies_every_path() {
        let stored = files(&[("same", "1"), ("changed", "2"), ("gone", "3")]);
        let current = files(&[("same", "1"), ("changed", "20"), ("new", "4")]);
        let diff = compare(&stored, &current);
        assert_eq!(diff.added, ["new"]);
        assert_eq!(diff.removed, ["gone"]);
        assert_eq!(diff.modified, ["changed"]);
        assert_eq!(diff.unchanged, ["same"]);
        assert!(!diff.is_valid());
    }

    #[test]
    fn additions_alone_are_valid() {
        let stored = files(&[("a", "1")]);
        let current = files(&[("a", "1"), ("b", "2")]);
        assert!(compare(&stored, &current).is_valid());
    }

    #[test]
    fn save_load_and_check() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("src")).unwrap();
        fs::write(tree.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(tree.join("README"), "hi").unwrap();

        let options = ScanOptions::default();
        let manifest = Manifest::generate(&tree, &options, Timestamp::from_millis(1)).unwrap();
        let out = dir.path().join("out/manifest.json");
        manifest.save(&out).unwrap();
        let loaded = Manifest::load(&out).unwrap();
        assert_eq!(loaded, manifest);
        assert!(loaded.check(&tree, &options).unwrap().is_valid());

        fs::write(tree.join("README"), "changed").unwrap();
        fs::remove_file(tree.join("src/main.rs")).unwrap();
        let diff = loaded.check(&tree, &options).unwrap();
        assert_eq!(diff.modified, ["README"]);
        assert_eq!(diff.removed, ["src/main.rs"]);
    }

    #[test]
    fn edited_file_list_fails_hash_check() {
        let mut manifest =
            Manifest::from_files("d", files(&[("a", "1")]), Timestamp::from_millis(0)).unwrap();
        manifest.files.insert("b".into(), ContentHasher::SHA256.hash(b"2"));
        assert!(!manifest.verify_hash().unwrap());
    }
}
