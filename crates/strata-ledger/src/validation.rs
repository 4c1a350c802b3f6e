use serde::{Deserialize, Serialize};
use strata_crypto::{ChainVerifier, HashLayer, Violation, ViolationKind};
use tracing::warn;

use crate::error::LogResult;
use crate::traits::LogReader;

/// Result of validating a whole chain log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogReport {
    pub layer_count: usize,
    /// Number of chains found (a chain starts at every level-0 layer).
    pub segment_count: usize,
    /// Violations with `index` relative to the start of the log.
    pub violations: Vec<Violation>,
}

impl LogReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Chain log validator.
pub struct LogValidator;

impl LogValidator {
    /// Validate every chain stored in `reader`.
    pub fn validate<R: LogReader + ?Sized>(reader: &R) -> LogResult<LogReport> {
        let layers = reader.read_all()?;
        Ok(Self::validate_layers(&layers))
    }

    /// Validate a flat run of layers holding one or more chains back to back.
    pub fn validate_layers(layers: &[HashLayer]) -> LogReport {
        let mut violations = Vec::new();

        if let Some(first) = layers.first() {
            if first.level != 0 {
                violations.push(Violation {
                    index: 0,
                    level: first.level,
                    kind: ViolationKind::LevelGap,
                    description: format!("log starts at level {} instead of 0", first.level),
                });
            } else if first.parent_hash.is_some() {
                violations.push(Violation {
                    index: 0,
                    level: 0,
                    kind: ViolationKind::ParentMismatch,
                    description: "first layer of the log carries a parent hash".into(),
                });
            }
        }

        let segments = segment_starts(layers);
        for (i, &start) in segments.iter().enumerate() {
            let end = segments.get(i + 1).copied().unwrap_or(layers.len());
            let report = ChainVerifier::verify(&layers[start..end]);
            violations.extend(report.violations.into_iter().map(|mut v| {
                v.index += start;
                v
            }));
        }

        if !violations.is_empty() {
            warn!(
                layers = layers.len(),
                violations = violations.len(),
                "chain log failed validation"
            );
        }

        LogReport {
            layer_count: layers.len(),
            segment_count: segments.len(),
            violations,
        }
    }
}

/// Indices where a new chain begins: index 0 and every level-0 layer.
fn segment_starts(layers: &[HashLayer]) -> Vec<usize> {
    let mut starts: Vec<usize> = layers
        .iter()
        .enumerate()
        .filter(|(_, layer)| layer.level == 0)
        .map(|(i, _)| i)
        .collect();
    if !layers.is_empty() && starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    starts
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use strata_crypto::HashChainBuilder;
    use strata_types::{Digest, ManualClock, Timestamp};

    use super::*;
    use crate::memory::InMemoryChainLog;
    use crate::traits::LogWriter;

    fn chain(content: &[u8], depth: usize) -> Vec<HashLayer> {
        let clock = ManualClock::new(Timestamp::from_millis(100), 1);
        HashChainBuilder::default()
            .build_chain(content, depth, &clock, None)
            .unwrap()
    }

    #[test]
    fn empty_log_is_valid() {
        let report = LogValidator::validate(&InMemoryChainLog::default()).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.segment_count, 0);
    }

    #[test]
    fn multiple_chains_are_separate_segments() {
        let log = InMemoryChainLog::new(Arc::new(ManualClock::new(Timestamp::zero(), 1)));
        log.append_chain(&chain(b"a", 3)).unwrap();
        log.append_chain(&chain(b"b", 5)).unwrap();
        log.append_chain(&chain(b"c", 1)).unwrap();

        let report = LogValidator::validate(&log).unwrap();
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.layer_count, 9);
        assert_eq!(report.segment_count, 3);
    }

    #[test]
    fn tampered_layer_reported_at_log_index() {
        let mut layers = chain(b"a", 3);
        layers.extend(chain(b"b", 4));
        layers[5].hash = layers[5].hash.with_flipped_bit(11);

        let report = LogValidator::validate_layers(&layers);
        assert!(!report.is_valid());
        assert_eq!(report.violations[0].index, 5);
        assert_eq!(report.violations[0].kind, ViolationKind::DigestMismatch);
        assert_eq!(report.violations[1].index, 6);
        assert_eq!(report.violations[1].kind, ViolationKind::ParentMismatch);
    }

    #[test]
    fn orphan_start_is_flagged() {
        let layers = chain(b"a", 4);
        let report = LogValidator::validate_layers(&layers[2..]);
        assert_eq!(report.segment_count, 1);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::LevelGap);
    }

    #[test]
    fn parent_on_level_zero_is_flagged() {
        let mut layers = chain(b"a", 2);
        layers[0].parent_hash = Some(Digest::from_bytes(vec![0u8; 32]));
        let report = LogValidator::validate_layers(&layers);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].index, 0);
        assert_eq!(report.violations[0].kind, ViolationKind::ParentMismatch);
    }
}
