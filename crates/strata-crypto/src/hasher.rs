use strata_types::{AlgorithmId, Digest};

use crate::error::CryptoError;

/// A digest function over a sequence of byte slices.
///
/// The parts are fed to the hash state in order, so
/// `f(&[a, b])` equals `f(&[a‖b])`. No separators are inserted.
pub type HashFn = fn(&[&[u8]]) -> Digest;

/// Look up the digest function for a supported algorithm.
pub fn hash_fn(algorithm: AlgorithmId) -> HashFn {
    match algorithm {
        AlgorithmId::Sha256 => rust_crypto::<sha2::Sha256>,
        AlgorithmId::Sha384 => rust_crypto::<sha2::Sha384>,
        AlgorithmId::Sha512 => rust_crypto::<sha2::Sha512>,
        AlgorithmId::Sha3_256 => rust_crypto::<sha3::Sha3_256>,
        AlgorithmId::Sha3_512 => rust_crypto::<sha3::Sha3_512>,
        AlgorithmId::Blake2b => rust_crypto::<blake2::Blake2b512>,
        AlgorithmId::Blake2s => rust_crypto::<blake2::Blake2s256>,
        AlgorithmId::Blake3 => blake3_parts,
    }
}

fn rust_crypto<D: sha2::Digest>(parts: &[&[u8]]) -> Digest {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    Digest::from_bytes(hasher.finalize().to_vec())
}

fn blake3_parts(parts: &[&[u8]]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    Digest::from_bytes(hasher.finalize().as_bytes().to_vec())
}

/// Content hasher bound to a single algorithm.
///
/// Unlike the chain builder, which rotates algorithms per level, a
/// `ContentHasher` always uses the same function. Merkle trees, cross
/// references and time-locks each hold one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    algorithm: AlgorithmId,
}

impl ContentHasher {
    pub const SHA256: Self = Self::new(AlgorithmId::Sha256);
    pub const SHA384: Self = Self::new(AlgorithmId::Sha384);
    pub const SHA512: Self = Self::new(AlgorithmId::Sha512);

    pub const fn new(algorithm: AlgorithmId) -> Self {
        Self { algorithm }
    }

    /// Hash raw bytes.
    pub fn hash(&self, data: &[u8]) -> Digest {
        hash_fn(self.algorithm)(&[data])
    }

    /// Hash the concatenation of `parts` without materializing it.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> Digest {
        hash_fn(self.algorithm)(parts)
    }

    /// Hash a serializable value as compact JSON.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<Digest, CryptoError> {
        let data =
            serde_json::to_vec(value).map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.hash(data) == *expected
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }
}
