use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of a supported fixed-output digest function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlgorithmId {
    #[serde(rename = "sha256")]
    Sha256,
    #[serde(rename = "sha384")]
    Sha384,
    #[serde(rename = "sha512")]
    Sha512,
    #[serde(rename = "sha3_256")]
    Sha3_256,
    #[serde(rename = "sha3_512")]
    Sha3_512,
    /// BLAKE2b with 512-bit output.
    #[serde(rename = "blake2b")]
    Blake2b,
    /// BLAKE2s with 256-bit output.
    #[serde(rename = "blake2s")]
    Blake2s,
    #[serde(rename = "blake3")]
    Blake3,
}

impl AlgorithmId {
    /// Every supported algorithm, in declaration order.
    pub const ALL: [AlgorithmId; 8] = [
        AlgorithmId::Sha256,
        AlgorithmId::Sha384,
        AlgorithmId::Sha512,
        AlgorithmId::Sha3_256,
        AlgorithmId::Sha3_512,
        AlgorithmId::Blake2b,
        AlgorithmId::Blake2s,
        AlgorithmId::Blake3,
    ];

    /// Stable textual identifier.
    pub const fn as_str(&self) -> &'static str {
        match self {
            AlgorithmId::Sha256 => "sha256",
            AlgorithmId::Sha384 => "sha384",
            AlgorithmId::Sha512 => "sha512",
            AlgorithmId::Sha3_256 => "sha3_256",
            AlgorithmId::Sha3_512 => "sha3_512",
            AlgorithmId::Blake2b => "blake2b",
            AlgorithmId::Blake2s => "blake2s",
            AlgorithmId::Blake3 => "blake3",
        }
    }

    /// Output width in bytes.
    pub const fn output_len(&self) -> usize {
        match self {
            AlgorithmId::Sha256
            | AlgorithmId::Sha3_256
            | AlgorithmId::Blake2s
            | AlgorithmId::Blake3 => 32,
            AlgorithmId::Sha384 => 48,
            AlgorithmId::Sha512 | AlgorithmId::Sha3_512 | AlgorithmId::Blake2b => 64,
        }
    }
}

impl FromStr for AlgorithmId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| TypeError::UnknownAlgorithm(s.to_string()))
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
