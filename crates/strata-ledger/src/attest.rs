use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_crypto::{
    ChainReport, ChainVerifier, ContentHasher, CrossReferenceHasher, HashChainBuilder, HashLayer,
    Metadata, MerkleTreeBuilder,
};
use strata_types::{Clock, Digest, Timestamp};
use tracing::{debug, warn};

use crate::error::{LogError, LogResult};
use crate::traits::LogWriter;

/// Chain attestation of a single task record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAttestation {
    pub task_id: String,
    pub layer_count: usize,
    pub final_hash: Digest,
    pub chain: Vec<HashLayer>,
}

/// Descriptive fields of a bundle of files under review.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleInfo {
    pub id: String,
    pub title: String,
    pub branch: String,
    pub task_id: String,
}

/// Merkle and cross-reference attestation of a bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleAttestation {
    pub bundle_id: String,
    pub merkle_root: Digest,
    pub cross_reference: Digest,
    pub file_count: usize,
    pub file_hashes: BTreeMap<String, Digest>,
}

/// File digests registered under a commit identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAttestation {
    pub sha: String,
    /// SHA-256 of the compact JSON `{"files", "sha", "timestamp"}` record.
    pub commit_hash: Digest,
    pub file_hashes: BTreeMap<String, Digest>,
    pub timestamp: Timestamp,
}

/// What a [`BundleCheck`] looked at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Task,
    File,
}

/// One line of a [`BundleValidation`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleCheck {
    pub kind: CheckKind,
    /// Task id or file path.
    pub subject: String,
    pub valid: bool,
}

/// Result of checking a bundle against what was attested earlier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleValidation {
    pub bundle_id: String,
    pub valid: bool,
    pub checks: Vec<BundleCheck>,
    /// SHA-256 over the bundle's title, branch, sorted paths and task id.
    pub bundle_hash: Digest,
    pub timestamp: Timestamp,
}

/// Compact-JSON shape hashed into [`CommitAttestation::commit_hash`].
/// Fields are declared in key order.
#[derive(Serialize)]
struct CommitRecord<'a> {
    files: &'a BTreeMap<String, Digest>,
    sha: &'a str,
    timestamp: String,
}

/// Compact-JSON shape hashed into [`BundleValidation::bundle_hash`].
#[derive(Serialize)]
struct BundleRecord<'a> {
    branch: &'a str,
    files: Vec<&'a String>,
    task_id: &'a str,
    title: &'a str,
}

/// Outcome of re-verifying a remembered task chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskVerification {
    pub task_id: String,
    pub final_hash: Digest,
    pub layers_verified: usize,
    pub report: ChainReport,
}

impl TaskVerification {
    pub fn is_valid(&self) -> bool {
        self.report.is_valid()
    }
}

/// Attests task and bundle records into a chain log.
pub struct Attestor<W: LogWriter> {
    log: Arc<W>,
    builder: HashChainBuilder,
    merkle: MerkleTreeBuilder,
    xref: CrossReferenceHasher,
    clock: Arc<dyn Clock>,
    depth: usize,
    tasks: RwLock<BTreeMap<String, TaskAttestation>>,
    bundles: RwLock<BTreeMap<String, BundleAttestation>>,
    commits: RwLock<BTreeMap<String, CommitAttestation>>,
}

impl<W: LogWriter> Attestor<W> {
    pub fn new(
        log: Arc<W>,
        builder: HashChainBuilder,
        clock: Arc<dyn Clock>,
        depth: usize,
    ) -> Self {
        Self {
            log,
            builder,
            merkle: MerkleTreeBuilder::default(),
            xref: CrossReferenceHasher::new(),
            clock,
            depth,
            tasks: RwLock::new(BTreeMap::new()),
            bundles: RwLock::new(BTreeMap::new()),
            commits: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn log(&self) -> &Arc<W> {
        &self.log
    }

    /// Chain a task record and append the chain to the log.
    ///
    /// The record is hashed as compact JSON with sorted keys, so logically
    /// equal records hash identically. The task's `id` field (string or
    /// number) becomes the `task_id` metadata of layer 0.
    pub fn attest_task(&self, task: &Value) -> LogResult<TaskAttestation> {
        let task_id = task_id_of(task)?;
        let canonical = canonical_json(task)?;

        let mut metadata = Metadata::new();
        metadata.insert("task_id".to_string(), task_id.clone());
        let chain = self
            .builder
            .build_chain(&canonical, self.depth, &*self.clock, Some(metadata))?;
        self.log.append_chain(&chain)?;

        let attestation = TaskAttestation {
            task_id: task_id.clone(),
            layer_count: chain.len(),
            final_hash: chain.last().map(|l| l.hash.clone()).unwrap_or_default(),
            chain,
        };
        self.tasks
            .write()
            .map_err(|_| LogError::LockPoisoned)?
            .insert(task_id, attestation.clone());

        debug!(
            task_id = %attestation.task_id,
            final_hash = %attestation.final_hash.short_hex(),
            "attested task"
        );
        Ok(attestation)
    }

    /// Build a Merkle tree over a bundle's file digests, record its root in
    /// the log, and bind it to the bundle's descriptive fields.
    ///
    /// Leaves are the hex digests in path order.
    pub fn attest_bundle(
        &self,
        bundle: &BundleInfo,
        file_hashes: &BTreeMap<String, Digest>,
    ) -> LogResult<BundleAttestation> {
        let tree = self.merkle.build(file_hashes.values().map(Digest::to_hex));
        let merkle_root = tree.root_hash().clone();
        self.log.record_merkle_root(&merkle_root)?;

        let cross_reference = self
            .xref
            .cross_reference([
                ("bundle_title", bundle.title.clone()),
                ("bundle_branch", bundle.branch.clone()),
                ("task_id", bundle.task_id.clone()),
                ("merkle_root", merkle_root.to_hex()),
            ])?
            .digest;

        let attestation = BundleAttestation {
            bundle_id: bundle.id.clone(),
            merkle_root,
            cross_reference,
            file_count: file_hashes.len(),
            file_hashes: file_hashes.clone(),
        };
        self.bundles
            .write()
            .map_err(|_| LogError::LockPoisoned)?
            .insert(bundle.id.clone(), attestation.clone());

        debug!(
            bundle_id = %bundle.id,
            files = attestation.file_count,
            root = %attestation.merkle_root.short_hex(),
            "attested bundle"
        );
        Ok(attestation)
    }

    /// Register the file digests belonging to a commit.
    ///
    /// Registering the same `sha` again replaces the earlier record.
    pub fn attest_commit(
        &self,
        sha: &str,
        file_hashes: &BTreeMap<String, Digest>,
    ) -> LogResult<CommitAttestation> {
        let timestamp = self.clock.now();
        let commit_hash = ContentHasher::SHA256.hash_json(&CommitRecord {
            files: file_hashes,
            sha,
            timestamp: timestamp.to_rfc3339(),
        })?;

        let attestation = CommitAttestation {
            sha: sha.to_string(),
            commit_hash,
            file_hashes: file_hashes.clone(),
            timestamp,
        };
        self.commits
            .write()
            .map_err(|_| LogError::LockPoisoned)?
            .insert(sha.to_string(), attestation.clone());

        debug!(
            sha,
            files = file_hashes.len(),
            commit_hash = %attestation.commit_hash.short_hex(),
            "attested commit"
        );
        Ok(attestation)
    }

    pub fn commit(&self, sha: &str) -> LogResult<Option<CommitAttestation>> {
        Ok(self
            .commits
            .read()
            .map_err(|_| LogError::LockPoisoned)?
            .get(sha)
            .cloned())
    }

    /// Check a bundle against its earlier attestation.
    ///
    /// When `task` is given and the bundle names a task, the record must
    /// match the attested task chain. Every file in `current_files` must
    /// match the digest attested for that path under the same bundle id;
    /// files the bundle never attested fail. Any failed check makes the
    /// whole validation invalid.
    pub fn validate_bundle(
        &self,
        bundle: &BundleInfo,
        task: Option<&Value>,
        current_files: &BTreeMap<String, Digest>,
    ) -> LogResult<BundleValidation> {
        let mut checks = Vec::new();

        if let Some(task) = task.filter(|_| !bundle.task_id.is_empty()) {
            let valid = match self.verify_task_record(task) {
                Ok(verification) => verification.is_valid(),
                Err(LogError::TaskNotFound(_)) => false,
                Err(err) => return Err(err),
            };
            checks.push(BundleCheck {
                kind: CheckKind::Task,
                subject: bundle.task_id.clone(),
                valid,
            });
        }

        let attested = self.bundle(&bundle.id)?;
        for (path, digest) in current_files {
            let registered = attested.as_ref().and_then(|a| a.file_hashes.get(path));
            checks.push(BundleCheck {
                kind: CheckKind::File,
                subject: path.clone(),
                valid: registered == Some(digest),
            });
        }

        let bundle_hash = ContentHasher::SHA256.hash_json(&BundleRecord {
            branch: &bundle.branch,
            files: current_files.keys().collect(),
            task_id: &bundle.task_id,
            title: &bundle.title,
        })?;
        let valid = checks.iter().all(|check| check.valid);
        if !valid {
            warn!(
                bundle_id = %bundle.id,
                failed = checks.iter().filter(|c| !c.valid).count(),
                "bundle failed validation"
            );
        }

        Ok(BundleValidation {
            bundle_id: bundle.id.clone(),
            valid,
            checks,
            bundle_hash,
            timestamp: self.clock.now(),
        })
    }

    /// Re-verify the remembered chain for `task_id`.
    pub fn verify_task(&self, task_id: &str) -> LogResult<TaskVerification> {
        let attestation = self.task(task_id)?;
        let report = ChainVerifier::verify(&attestation.chain);
        self.finish_verification(attestation, report)
    }

    /// Re-verify the remembered chain for a task and check that it commits
    /// to this exact record.
    pub fn verify_task_record(&self, task: &Value) -> LogResult<TaskVerification> {
        let attestation = self.task(&task_id_of(task)?)?;
        let canonical = canonical_json(task)?;
        let report = ChainVerifier::verify_with_content(&attestation.chain, &canonical);
        self.finish_verification(attestation, report)
    }

    pub fn bundle(&self, bundle_id: &str) -> LogResult<Option<BundleAttestation>> {
        Ok(self
            .bundles
            .read()
            .map_err(|_| LogError::LockPoisoned)?
            .get(bundle_id)
            .cloned())
    }

    fn task(&self, task_id: &str) -> LogResult<TaskAttestation> {
        self.tasks
            .read()
            .map_err(|_| LogError::LockPoisoned)?
            .get(task_id)
            .cloned()
            .ok_or_else(|| LogError::TaskNotFound(task_id.to_string()))
    }

    fn finish_verification(
        &self,
        attestation: TaskAttestation,
        report: ChainReport,
    ) -> LogResult<TaskVerification> {
        if !report.is_valid() {
            warn!(
                task_id = %attestation.task_id,
                violations = report.violations.len(),
                "task chain failed verification"
            );
        }
        Ok(TaskVerification {
            task_id: attestation.task_id,
            final_hash: attestation.final_hash,
            layers_verified: report.layer_count,
            report,
        })
    }
}

fn task_id_of(task: &Value) -> LogResult<String> {
    match task.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(LogError::InvalidRecord(
            "task record has no string or numeric `id`".into(),
        )),
    }
}

/// Compact JSON with object keys in sorted order.
fn canonical_json(value: &Value) -> LogResult<Vec<u8>> {
    let sorted = sort_keys(value);
    serde_json::to_vec(&sorted).map_err(|e| LogError::Serialization(e.to_string()))
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}
