//! Whole-directory integrity reports.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_crypto::{HashChainBuilder, MerkleTreeBuilder};
use strata_types::{AlgorithmId, Clock, Digest};
use tracing::debug;

use crate::error::IndexResult;
use crate::scan::{scan_directory, ScanOptions};

/// Per-level summary in an [`IntegrityReport`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: u32,
    pub algorithm: AlgorithmId,
    /// First 16 hex characters of the layer digest.
    pub hash_prefix: String,
}

/// Merkle root over a directory's file digests, layered through a hash chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// RFC 3339 generation time.
    pub generated: String,
    pub directory: String,
    pub file_count: usize,
    pub merkle_root: Digest,
    pub depth: usize,
    pub final_hash: Digest,
    /// Distinct algorithms in the chain, in order of first use.
    pub algorithms_used: Vec<AlgorithmId>,
    pub verification_chain: Vec<LevelSummary>,
}

impl IntegrityReport {
    /// Scan `dir`, build a Merkle tree over the hex file digests in path
    /// order, and chain the root's hex text to `depth` layers.
    pub fn generate<C: Clock + ?Sized>(
        dir: &Path,
        options: &ScanOptions,
        builder: &HashChainBuilder,
        clock: &C,
        depth: usize,
    ) -> IndexResult<Self> {
        let files = scan_directory(dir, options)?;
        let tree = MerkleTreeBuilder::default().build(files.values().map(Digest::to_hex));
        let merkle_root = tree.root_hash().clone();

        let chain = builder.build_chain(merkle_root.to_hex().as_bytes(), depth, clock, None)?;
        let generated = chain[0].timestamp.to_rfc3339();

        let mut algorithms_used = Vec::new();
        for layer in &chain {
            if !algorithms_used.contains(&layer.algorithm) {
                algorithms_used.push(layer.algorithm);
            }
        }
        let verification_chain = chain
            .iter()
            .map(|layer| LevelSummary {
                level: layer.level,
                algorithm: layer.algorithm,
                hash_prefix: layer.hash.to_hex().chars().take(16).collect(),
            })
            .collect();
        let final_hash = chain[chain.len() - 1].hash.clone();

        debug!(
            dir = %dir.display(),
            files = files.len(),
            root = %merkle_root.short_hex(),
            "generated integrity report"
        );
        Ok(Self {
            generated,
            directory: dir.display().to_string(),
            file_count: files.len(),
            merkle_root,
            depth: chain.len(),
            final_hash,
            algorithms_used,
            verification_chain,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use strata_crypto::{AlgorithmRegistry, ContentHasher};
    use strata_types::FixedClock;

    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("b.txt"), "beta").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/config"), "ignored").unwrap();
        dir
    }

    #[test]
    fn report_covers_files_and_chain() {
        let dir = tree();
        let clock = FixedClock::at_millis(1_700_000_000_000);
        let report = IntegrityReport::generate(
            dir.path(),
            &ScanOptions::default(),
            &HashChainBuilder::default(),
            &clock,
            7,
        )
        .unwrap();

        assert_eq!(report.file_count, 2);
        assert_eq!(report.depth, 7);
        assert_eq!(report.algorithms_used.len(), 7);
        assert_eq!(report.verification_chain.len(), 7);
        assert!(report
            .verification_chain
            .iter()
            .all(|l| l.hash_prefix.len() == 16));
        assert_eq!(report.generated, "2023-11-14T22:13:20.000Z");

        let leaves = [
            ContentHasher::SHA256.hash(b"alpha").to_hex(),
            ContentHasher::SHA256.hash(b"beta").to_hex(),
        ];
        let root = MerkleTreeBuilder::default().build(&leaves);
        assert_eq!(&report.merkle_root, root.root_hash());
    }

    #[test]
    fn short_rotation_repeats_algorithms() {
        let dir = tree();
        let registry = AlgorithmRegistry::with_rotation(["sha256", "blake3"]).unwrap();
        let report = IntegrityReport::generate(
            dir.path(),
            &ScanOptions::default(),
            &HashChainBuilder::new(registry),
            &FixedClock::at_millis(0),
            5,
        )
        .unwrap();
        assert_eq!(report.algorithms_used, [AlgorithmId::Sha256, AlgorithmId::Blake3]);
    }

    #[test]
    fn content_change_moves_final_hash() {
        let dir = tree();
        let clock = FixedClock::at_millis(0);
        let builder = HashChainBuilder::default();
        let options = ScanOptions::default();
        let before = IntegrityReport::generate(dir.path(), &options, &builder, &clock, 3).unwrap();
        fs::write(dir.path().join("b.txt"), "gamma").unwrap();
        let after = IntegrityReport::generate(dir.path(), &options, &builder, &clock, 3).unwrap();
        assert_ne!(before.merkle_root, after.merkle_root);
        assert_ne!(before.final_hash, after.final_hash);
    }
}
