//! Directory manifests for strata.
//!
//! Walks a directory, hashes every file, and records the result so the tree
//! can be checked again later.
//!
//! # Key Types
//!
//! - [`ScanOptions`] -- Exclusions and digest algorithm for a scan
//! - [`Manifest`] -- Path to digest map with its own digest
//! - [`ManifestDiff`] -- Added, removed, modified and unchanged paths
//! - [`IntegrityReport`] -- Merkle root and hash chain over a whole directory

pub mod error;
pub mod manifest;
pub mod report;
pub mod scan;

pub use error::{IndexError, IndexResult};
pub use manifest::{compare, Manifest, ManifestDiff, MANIFEST_VERSION};
pub use report::{IntegrityReport, LevelSummary};
pub use scan::{hash_file, scan_directory, ScanOptions, DEFAULT_EXCLUDES};
