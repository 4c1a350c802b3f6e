use strata_types::AlgorithmId;

use crate::error::CryptoError;
use crate::hasher::{self, ContentHasher, HashFn};

/// Default per-level rotation used by chain builds.
///
/// BLAKE3 is resolvable but not part of the default rotation.
pub const DEFAULT_ROTATION: [AlgorithmId; 7] = [
    AlgorithmId::Sha256,
    AlgorithmId::Sha384,
    AlgorithmId::Sha512,
    AlgorithmId::Sha3_256,
    AlgorithmId::Sha3_512,
    AlgorithmId::Blake2b,
    AlgorithmId::Blake2s,
];

/// Resolves algorithm identifiers to digest functions and holds the ordered
/// rotation a chain build walks through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlgorithmRegistry {
    rotation: Vec<AlgorithmId>,
}

impl AlgorithmRegistry {
    /// Registry with the [`DEFAULT_ROTATION`].
    pub fn new() -> Self {
        Self {
            rotation: DEFAULT_ROTATION.to_vec(),
        }
    }

    /// Registry with an explicit rotation given as textual identifiers.
    pub fn with_rotation<I, S>(ids: I) -> Result<Self, CryptoError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rotation = ids
            .into_iter()
            .map(|id| {
                let id = id.as_ref();
                id.parse::<AlgorithmId>()
                    .map_err(|_| CryptoError::UnsupportedAlgorithm(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_ids(rotation)
    }

    /// Registry with an explicit rotation of already-parsed identifiers.
    pub fn from_ids(rotation: Vec<AlgorithmId>) -> Result<Self, CryptoError> {
        if rotation.is_empty() {
            return Err(CryptoError::EmptyRotation);
        }
        Ok(Self { rotation })
    }

    /// Resolve a textual identifier to its digest function.
    pub fn resolve(&self, id: &str) -> Result<HashFn, CryptoError> {
        let algorithm = id
            .parse::<AlgorithmId>()
            .map_err(|_| CryptoError::UnsupportedAlgorithm(id.to_string()))?;
        Ok(hasher::hash_fn(algorithm))
    }

    /// A content hasher for a supported algorithm.
    pub fn hasher(&self, algorithm: AlgorithmId) -> ContentHasher {
        ContentHasher::new(algorithm)
    }

    /// The rotation, in order.
    pub fn ordered_ids(&self) -> &[AlgorithmId] {
        &self.rotation
    }

    /// Algorithm used at chain `level`: `rotation[level mod len]`.
    pub fn for_level(&self, level: usize) -> AlgorithmId {
        self.rotation[level % self.rotation.len()]
    }

    pub fn len(&self) -> usize {
        self.rotation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_empty()
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn default_rotation_has_diverse_algorithms() {
        let registry = AlgorithmRegistry::new();
        let distinct: HashSet<_> = registry.ordered_ids().iter().collect();
        assert!(distinct.len() >= 5);
        assert_eq!(registry.ordered_ids()[0], AlgorithmId::Sha256);
    }

    #[test]
    fn resolve_known_ids() {
        let registry = AlgorithmRegistry::new();
        for id in ["sha256", "sha3_512", "blake2s", "blake3"] {
            let f = registry.resolve(id).unwrap();
            assert!(!f(&[&b"x"[..]]).is_empty());
        }
    }

    #[test]
    fn resolve_unknown_id_fails() {
        let registry = AlgorithmRegistry::new();
        let err = registry.resolve("md5").unwrap_err();
        assert_eq!(err, CryptoError::UnsupportedAlgorithm("md5".into()));
    }

    #[test]
    fn custom_rotation() {
        let registry =
            AlgorithmRegistry::with_rotation(["sha256", "sha3_256", "blake2b"]).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.for_level(0), AlgorithmId::Sha256);
        assert_eq!(registry.for_level(4), AlgorithmId::Sha3_256);
    }

    #[test]
    fn custom_rotation_rejects_unknown() {
        let err = AlgorithmRegistry::with_rotation(["sha256", "whirlpool"]).unwrap_err();
        assert_eq!(err, CryptoError::UnsupportedAlgorithm("whirlpool".into()));
    }

    #[test]
    fn empty_rotation_is_rejected() {
        let err = AlgorithmRegistry::with_rotation(Vec::<String>::new()).unwrap_err();
        assert_eq!(err, CryptoError::EmptyRotation);
    }

    #[test]
    fn rotation_wraps_around() {
        let registry = AlgorithmRegistry::new();
        assert_eq!(registry.for_level(7), registry.for_level(0));
        assert_eq!(registry.for_level(13), AlgorithmId::Blake2s);
    }
}
