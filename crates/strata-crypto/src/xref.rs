use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_types::Digest;
use tracing::debug;

use crate::error::CryptoError;
use crate::hasher::ContentHasher;

/// Result of a cross-reference fold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReferenceCommitment {
    /// Binding digest over every entry.
    pub digest: Digest,
    /// Running fold digest recorded after each key, for audit.
    pub intermediates: BTreeMap<String, Digest>,
}

/// Folds a key/value mapping into one order-independent digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrossReferenceHasher {
    fold: ContentHasher,
    finish: ContentHasher,
}

impl CrossReferenceHasher {
    pub fn new() -> Self {
        Self {
            fold: ContentHasher::SHA256,
            finish: ContentHasher::SHA512,
        }
    }

    /// Cross-reference a set of `(key, value)` pairs.
    ///
    /// Entries are sorted by key before folding, so insertion order never
    /// matters. A repeated key keeps its last value.
    pub fn cross_reference<I, K, V>(
        &self,
        entries: I,
    ) -> Result<CrossReferenceCommitment, CryptoError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let sorted: BTreeMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut running = Digest::empty();
        let mut intermediates = BTreeMap::new();
        for (key, value) in &sorted {
            running = self
                .fold
                .hash_parts(&[running.as_bytes(), key.as_bytes(), value.as_bytes()]);
            intermediates.insert(key.clone(), running.clone());
        }

        let hex_map: BTreeMap<&str, String> = intermediates
            .iter()
            .map(|(k, d)| (k.as_str(), d.to_hex()))
            .collect();
        let digest = self.finish.hash_json(&hex_map)?;

        debug!(entries = sorted.len(), digest = %digest.short_hex(), "cross-referenced");
        Ok(CrossReferenceCommitment {
            digest,
            intermediates,
        })
    }

    /// Recompute the digest for `entries` and compare it with `expected`.
    pub fn verify<I, K, V>(&self, entries: I, expected: &Digest) -> Result<bool, CryptoError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Ok(self.cross_reference(entries)?.digest == *expected)
    }
}

impl Default for CrossReferenceHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs() -> Vec<(&'static str, &'static str)> {
        vec![("task", "TASK-001"), ("pr", "PR-42"), ("commit", "abc123")]
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let hasher = CrossReferenceHasher::new();
        let forward = hasher.cross_reference(refs()).unwrap();
        let reversed = hasher.cross_reference(refs().into_iter().rev()).unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn final_digest_is_wider_than_fold() {
        let xref = CrossReferenceHasher::new().cross_reference(refs()).unwrap();
        assert_eq!(xref.digest.len(), 64);
        assert!(xref.intermediates.values().all(|d| d.len() == 32));
    }

    #[test]
    fn intermediates_follow_sorted_keys() {
        let xref = CrossReferenceHasher::new().cross_reference(refs()).unwrap();
        let keys: Vec<_> = xref.intermediates.keys().map(String::as_str).collect();
        assert_eq!(keys, ["commit", "pr", "task"]);

        let first = ContentHasher::SHA256.hash(b"commitabc123");
        assert_eq!(xref.intermediates["commit"], first);
        let second =
            ContentHasher::SHA256.hash_parts(&[first.as_bytes(), &b"pr"[..], &b"PR-42"[..]]);
        assert_eq!(xref.intermediates["pr"], second);
    }

    #[test]
    fn any_single_change_alters_digest() {
        let hasher = CrossReferenceHasher::new();
        let base = hasher.cross_reference(refs()).unwrap().digest;

        let mut changed = refs();
        changed[1].1 = "PR-43";
        assert_ne!(hasher.cross_reference(changed).unwrap().digest, base);

        let mut added = refs();
        added.push(("review", "approved"));
        assert_ne!(hasher.cross_reference(added).unwrap().digest, base);

        let mut removed = refs();
        removed.pop();
        assert_ne!(hasher.cross_reference(removed).unwrap().digest, base);
    }

    #[test]
    fn duplicate_key_keeps_last_value() {
        let hasher = CrossReferenceHasher::new();
        let dup = hasher.cross_reference([("a", "1"), ("a", "2")]).unwrap();
        let single = hasher.cross_reference([("a", "2")]).unwrap();
        assert_eq!(dup, single);
    }

    #[test]
    fn empty_mapping_is_hash_of_empty_object() {
        let xref = CrossReferenceHasher::new()
            .cross_reference(Vec::<(String, String)>::new())
            .unwrap();
        assert!(xref.intermediates.is_empty());
        assert_eq!(xref.digest, ContentHasher::SHA512.hash(b"{}"));
    }

    #[test]
    fn verify_matches_recomputation() {
        let hasher = CrossReferenceHasher::new();
        let digest = hasher.cross_reference(refs()).unwrap().digest;
        assert!(hasher.verify(refs(), &digest).unwrap());
        assert!(!hasher.verify([("task", "TASK-002")], &digest).unwrap());
    }
}
