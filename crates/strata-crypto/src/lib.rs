//! Hashing and commitment engine for strata.
//!
//! Composes existing digest functions into:
//! - layered hash chains with per-level algorithm rotation ([`HashChainBuilder`])
//! - full-report chain verification ([`ChainVerifier`])
//! - binary Merkle trees with inclusion proofs ([`MerkleTreeBuilder`], [`MerkleProofService`])
//! - order-independent cross-reference digests ([`CrossReferenceHasher`])
//! - time-gated commitments ([`TimeLock`])
//!
//! Every operation is a pure function of its inputs. Time enters only through
//! an injected [`strata_types::Clock`] or an explicit "now".

pub mod chain;
pub mod error;
pub mod hasher;
pub mod merkle;
pub mod registry;
pub mod timelock;
pub mod xref;

pub use chain::{
    ChainReport, ChainVerifier, HashChainBuilder, HashLayer, Metadata, Violation, ViolationKind,
};
pub use error::{CryptoError, CryptoResult};
pub use hasher::{ContentHasher, HashFn};
pub use merkle::{
    MerkleNode, MerkleProof, MerkleProofService, MerkleTree, MerkleTreeBuilder, NodeKind, Side,
};
pub use registry::{AlgorithmRegistry, DEFAULT_ROTATION};
pub use timelock::{TimeLock, TimeLockCommitment, TimeLockError};
pub use xref::{CrossReferenceCommitment, CrossReferenceHasher};
