use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_types::{AlgorithmId, Clock, Digest, Timestamp};
use tracing::debug;

use crate::error::CryptoError;
use crate::hasher;
use crate::registry::AlgorithmRegistry;

/// Opaque key/value annotations attached to the first layer of a chain.
pub type Metadata = BTreeMap<String, String>;

/// One layer of a hash chain.
///
/// Immutable once built. For every layer after the first,
/// `parent_hash == Some(previous.hash)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashLayer {
    pub level: u32,
    pub hash: Digest,
    pub algorithm: AlgorithmId,
    pub timestamp: Timestamp,
    /// `None` only at level 0.
    pub parent_hash: Option<Digest>,
    /// Present only at level 0.
    pub metadata: Option<Metadata>,
}

/// Digest of a single layer: `H_alg(timestamp ‖ parent ‖ payload)`.
///
/// At level 0 there is no parent and the payload is the original content.
/// Above level 0 the payload is the previous layer's digest, which is also
/// the parent, so the input is `timestamp ‖ prev ‖ prev`.
pub fn layer_digest(
    algorithm: AlgorithmId,
    timestamp: &Timestamp,
    parent: Option<&Digest>,
    payload: &[u8],
) -> Digest {
    let ts = timestamp.to_bytes();
    let parent = parent.map(Digest::as_bytes).unwrap_or_default();
    hasher::hash_fn(algorithm)(&[&ts[..], parent, payload])
}

/// Builds layered hash chains, rotating algorithms per level.
#[derive(Clone, Debug, Default)]
pub struct HashChainBuilder {
    registry: AlgorithmRegistry,
}

impl HashChainBuilder {
    pub fn new(registry: AlgorithmRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    /// Build a chain of exactly `depth` layers over `content`.
    ///
    /// Level `n` uses `registry.for_level(n)`. After level 0 the original
    /// content is no longer re-hashed; it influences later layers only
    /// through the previous digest.
    pub fn build_chain<C: Clock + ?Sized>(
        &self,
        content: &[u8],
        depth: usize,
        clock: &C,
        metadata: Option<Metadata>,
    ) -> Result<Vec<HashLayer>, CryptoError> {
        let max = u32::MAX as usize;
        if depth == 0 || depth > max {
            return Err(CryptoError::InvalidDepth {
                requested: depth,
                max,
            });
        }

        let mut layers: Vec<HashLayer> = Vec::with_capacity(depth);
        let mut metadata = metadata;

        for level in 0..depth {
            let algorithm = self.registry.for_level(level);
            let timestamp = clock.now();
            let parent_hash = layers.last().map(|prev| prev.hash.clone());
            let hash = match &parent_hash {
                None => layer_digest(algorithm, &timestamp, None, content),
                Some(prev) => layer_digest(algorithm, &timestamp, Some(prev), prev.as_bytes()),
            };

            layers.push(HashLayer {
                level: level as u32,
                hash,
                algorithm,
                timestamp,
                parent_hash,
                metadata: metadata.take(),
            });
        }

        debug!(
            depth,
            content_len = content.len(),
            final_hash = %layers[depth - 1].hash.short_hex(),
            "built hash chain"
        );
        Ok(layers)
    }
}

/// Category of a chain integrity failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// `parent_hash` does not equal the previous layer's hash.
    ParentMismatch,
    /// Timestamp is earlier than the previous layer's.
    TimestampRegression,
    /// Level does not follow the previous layer's level.
    LevelGap,
    /// Stored hash differs from the recomputed digest.
    DigestMismatch,
}

/// A specific integrity violation detected during verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Position of the offending layer within the verified slice.
    pub index: usize,
    pub level: u32,
    pub kind: ViolationKind,
    pub description: String,
}

/// Full diagnostic report from [`ChainVerifier`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub layer_count: usize,
    pub violations: Vec<Violation>,
}

impl ChainReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Convert into a `Result`, carrying every violation on failure.
    pub fn into_result(self) -> Result<(), CryptoError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(CryptoError::StructuralViolation {
                violations: self.violations,
            })
        }
    }
}

/// Chain integrity verifier.
///
/// Never stops at the first failure: every check on every adjacent pair runs
/// and each failure is appended to the report, in layer order.
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify the structure of a chain.
    ///
    /// For each layer `i > 0`, in this order:
    /// 1. `parent_hash` equals layer `i-1`'s hash
    /// 2. timestamp is not earlier than layer `i-1`'s
    /// 3. level is layer `i-1`'s level plus one
    /// 4. stored hash equals `H(ts_i ‖ hash_{i-1} ‖ hash_{i-1})`
    ///
    /// Chains of length 0 or 1 are trivially valid.
    pub fn verify(chain: &[HashLayer]) -> ChainReport {
        let mut violations = Vec::new();

        for (index, pair) in chain.windows(2).enumerate() {
            let (prev, layer) = (&pair[0], &pair[1]);
            let index = index + 1;

            if layer.parent_hash.as_ref() != Some(&prev.hash) {
                violations.push(Violation {
                    index,
                    level: layer.level,
                    kind: ViolationKind::ParentMismatch,
                    description: format!("layer {}: parent hash mismatch", layer.level),
                });
            }

            if layer.timestamp < prev.timestamp {
                violations.push(Violation {
                    index,
                    level: layer.level,
                    kind: ViolationKind::TimestampRegression,
                    description: format!(
                        "layer {}: timestamp ordering violation ({} < {})",
                        layer.level, layer.timestamp, prev.timestamp
                    ),
                });
            }

            if prev.level.checked_add(1) != Some(layer.level) {
                violations.push(Violation {
                    index,
                    level: layer.level,
                    kind: ViolationKind::LevelGap,
                    description: format!(
                        "layer {}: expected level {}",
                        layer.level,
                        u64::from(prev.level) + 1
                    ),
                });
            }

            let expected = layer_digest(
                layer.algorithm,
                &layer.timestamp,
                Some(&prev.hash),
                prev.hash.as_bytes(),
            );
            if expected != layer.hash {
                violations.push(Violation {
                    index,
                    level: layer.level,
                    kind: ViolationKind::DigestMismatch,
                    description: format!(
                        "layer {}: stored {} hash does not match recomputed digest",
                        layer.level, layer.algorithm
                    ),
                });
            }
        }

        ChainReport {
            layer_count: chain.len(),
            violations,
        }
    }

    /// Verify a chain and additionally recompute its first layer from the
    /// original content.
    pub fn verify_with_content(chain: &[HashLayer], content: &[u8]) -> ChainReport {
        let mut report = Self::verify(chain);
        if let Some(first) = chain.first() {
            let expected = layer_digest(first.algorithm, &first.timestamp, None, content);
            if first.parent_hash.is_some() || expected != first.hash {
                report.violations.insert(
                    0,
                    Violation {
                        index: 0,
                        level: first.level,
                        kind: ViolationKind::DigestMismatch,
                        description: format!(
                            "layer {}: does not commit to the supplied content",
                            first.level
                        ),
                    },
                );
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use strata_types::{FixedClock, ManualClock};

    use super::*;

    fn manual_clock() -> ManualClock {
        ManualClock::new(Timestamp::from_millis(1_700_000_000_000), 1)
    }

    fn build(content: &[u8], depth: usize) -> Vec<HashLayer> {
        HashChainBuilder::default()
            .build_chain(content, depth, &manual_clock(), None)
            .unwrap()
    }

    #[test]
    fn chain_has_requested_depth_and_links() {
        let chain = build(b"content", 7);
        assert_eq!(chain.len(), 7);
        assert!(chain[0].parent_hash.is_none());
        for i in 1..chain.len() {
            assert_eq!(chain[i].parent_hash.as_ref(), Some(&chain[i - 1].hash));
            assert_eq!(chain[i].level, i as u32);
        }
    }

    #[test]
    fn algorithms_rotate_per_level() {
        let registry = AlgorithmRegistry::new();
        let chain = build(b"content", 9);
        for layer in &chain {
            assert_eq!(layer.algorithm, registry.for_level(layer.level as usize));
            assert_eq!(layer.hash.len(), layer.algorithm.output_len());
        }
    }

    #[test]
    fn zero_depth_is_rejected() {
        let err = HashChainBuilder::default()
            .build_chain(b"x", 0, &manual_clock(), None)
            .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidDepth { requested: 0, .. }));
    }

    #[test]
    fn metadata_only_on_first_layer() {
        let mut metadata = Metadata::new();
        metadata.insert("task_id".into(), "TASK-1".into());
        let chain = HashChainBuilder::default()
            .build_chain(b"x", 3, &manual_clock(), Some(metadata.clone()))
            .unwrap();
        assert_eq!(chain[0].metadata.as_ref(), Some(&metadata));
        assert!(chain[1].metadata.is_none());
        assert!(chain[2].metadata.is_none());
    }

    #[test]
    fn later_layers_depend_only_on_previous_digest() {
        let clock = FixedClock::at_millis(42);
        let builder = HashChainBuilder::default();
        let a = builder.build_chain(b"one", 3, &clock, None).unwrap();
        let b = builder.build_chain(b"two", 3, &clock, None).unwrap();
        assert_ne!(a[0].hash, b[0].hash);
        let recomputed = layer_digest(
            a[1].algorithm,
            &a[1].timestamp,
            Some(&a[0].hash),
            a[0].hash.as_bytes(),
        );
        assert_eq!(recomputed, a[1].hash);
    }

    #[test]
    fn fresh_chain_verifies() {
        let chain = build(b"content", 7);
        let report = ChainVerifier::verify(&chain);
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.layer_count, 7);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn short_chains_are_trivially_valid() {
        assert!(ChainVerifier::verify(&[]).is_valid());
        assert!(ChainVerifier::verify(&build(b"x", 1)).is_valid());
    }

    #[test]
    fn broken_parent_link_is_reported() {
        let mut chain = build(b"content", 4);
        chain[2].parent_hash = Some(Digest::from_bytes(vec![9; 32]));
        let report = ChainVerifier::verify(&chain);
        assert!(!report.is_valid());
        assert!(report
            .violations
            .iter()
            .any(|v| v.index == 2 && v.kind == ViolationKind::ParentMismatch));
    }

    #[test]
    fn timestamp_regression_is_reported() {
        let mut chain = build(b"content", 3);
        chain[2].timestamp = Timestamp::from_millis(1);
        let report = ChainVerifier::verify(&chain);
        let kinds: Vec<_> = report.violations.iter().map(|v| v.kind).collect();
        assert!(kinds.contains(&ViolationKind::TimestampRegression));
        // The timestamp is hashed, so the digest no longer matches either.
        assert!(kinds.contains(&ViolationKind::DigestMismatch));
    }

    #[test]
    fn all_violations_are_collected_in_order() {
        let mut chain = build(b"content", 5);
        chain[1].parent_hash = None;
        chain[3].level = 9;
        let report = ChainVerifier::verify(&chain);
        let indices: Vec<_> = report.violations.iter().map(|v| v.index).collect();
        let mut sorted = indices.clone();
        sorted.sort();
        assert_eq!(indices, sorted);
        assert!(report.violations.iter().any(|v| v.index == 1));
        assert!(report
            .violations
            .iter()
            .any(|v| v.index == 3 && v.kind == ViolationKind::LevelGap));
        // Layer 4 follows level 9, so it also reports a gap.
        assert!(report
            .violations
            .iter()
            .any(|v| v.index == 4 && v.kind == ViolationKind::LevelGap));
    }

    #[test]
    fn flipping_any_stored_hash_bit_is_detected() {
        let chain = build(b"content", 5);
        for i in 0..chain.len() {
            for bit in [0, 7, 100, 255] {
                let mut tampered = chain.clone();
                tampered[i].hash = tampered[i].hash.with_flipped_bit(bit);
                let report = ChainVerifier::verify(&tampered);
                assert!(!report.is_valid(), "flip of layer {i} bit {bit} went unnoticed");
            }
        }
    }

    #[test]
    fn into_result_carries_violations() {
        let mut chain = build(b"content", 2);
        chain[1].parent_hash = None;
        match ChainVerifier::verify(&chain).into_result() {
            Err(CryptoError::StructuralViolation { violations }) => {
                assert_eq!(violations[0].kind, ViolationKind::ParentMismatch);
            }
            other => panic!("expected structural violation, got {other:?}"),
        }
    }

    #[test]
    fn verify_with_content_binds_first_layer() {
        let chain = build(b"content", 3);
        assert!(ChainVerifier::verify_with_content(&chain, b"content").is_valid());

        let report = ChainVerifier::verify_with_content(&chain, b"other");
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].index, 0);

        let single = build(b"content", 1);
        let mut tampered = single.clone();
        tampered[0].hash = tampered[0].hash.with_flipped_bit(3);
        assert!(ChainVerifier::verify(&tampered).is_valid());
        assert!(!ChainVerifier::verify_with_content(&tampered, b"content").is_valid());
    }

    #[test]
    fn layer_serde_roundtrip() {
        let chain = build(b"content", 2);
        let json = serde_json::to_string(&chain).unwrap();
        let parsed: Vec<HashLayer> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, chain);
    }
}
