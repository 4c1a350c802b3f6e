//! Append-only chain log for strata.
//!
//! This crate stores the hash chains produced by `strata-crypto`. It provides:
//! - `LogWriter` / `LogReader` trait boundaries
//! - `InMemoryChainLog` for tests and embedding
//! - `PersistentChainLog`, which mirrors its state to a JSON or bincode file
//! - Log validation, segment by segment
//! - Task, bundle and commit attestation on top of a log, plus bundle validation

pub mod attest;
pub mod error;
pub mod memory;
pub mod persistent;
pub mod state;
pub mod traits;
pub mod validation;

pub use attest::{
    Attestor, BundleAttestation, BundleCheck, BundleInfo, BundleValidation, CheckKind,
    CommitAttestation, TaskAttestation, TaskVerification,
};
pub use error::{LogError, LogResult};
pub use memory::InMemoryChainLog;
pub use persistent::PersistentChainLog;
pub use state::{LogState, StateFile, StateFormat};
pub use traits::{LogReader, LogWriter};
pub use validation::{LogReport, LogValidator};
