//! Foundation types for strata.
//!
//! Every other strata crate depends on `strata-types`. Nothing here hashes
//! anything; these are the value types the hashing engine produces and
//! consumes.
//!
//! # Key Types
//!
//! - [`Digest`]: Variable-width digest bytes with hex encoding
//! - [`AlgorithmId`]: Identifier of a supported digest function
//! - [`Timestamp`]: Hybrid logical timestamp used as an ordering token
//! - [`Clock`]: Injected time source (wall clock, fixed, or manual)

pub mod algorithm;
pub mod clock;
pub mod digest;
pub mod error;
pub mod temporal;

pub use algorithm::AlgorithmId;
pub use clock::{Clock, FixedClock, HybridLogicalClock, ManualClock};
pub use digest::Digest;
pub use error::TypeError;
pub use temporal::Timestamp;
