use serde::{Deserialize, Serialize};
use strata_types::{Digest, Timestamp};
use tracing::debug;

use crate::hasher::ContentHasher;

/// Staged time-lock verification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeLockError {
    #[error("time lock still active until {}", lock_time.to_rfc3339())]
    LockStillActive { lock_time: Timestamp },

    #[error("content does not match committed hash")]
    ContentMismatch,

    #[error("commitment hash does not match content hash and lock time")]
    CommitmentMismatch,
}

/// A hash commitment that only verifies once `lock_time` has passed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLockCommitment {
    pub content_hash: Digest,
    pub lock_time: Timestamp,
    pub commitment_hash: Digest,
    pub created: Timestamp,
}

/// Creates and checks [`TimeLockCommitment`]s.
///
/// "Now" is always supplied by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeLock {
    content: ContentHasher,
    commitment: ContentHasher,
}

impl TimeLock {
    pub fn new() -> Self {
        Self {
            content: ContentHasher::SHA256,
            commitment: ContentHasher::SHA384,
        }
    }

    /// Commit to `content` until `lock_time`.
    pub fn lock(&self, content: &[u8], lock_time: Timestamp, now: Timestamp) -> TimeLockCommitment {
        let content_hash = self.content.hash(content);
        let commitment_hash = self.commitment_digest(&content_hash, &lock_time);
        debug!(
            lock_time = %lock_time,
            commitment = %commitment_hash.short_hex(),
            "created time lock"
        );
        TimeLockCommitment {
            content_hash,
            lock_time,
            commitment_hash,
            created: now,
        }
    }

    /// Check a commitment against `content` at `now`.
    ///
    /// The lock gate is checked before anything else, then the content, then
    /// the binding of content hash and lock time.
    pub fn verify(
        &self,
        commitment: &TimeLockCommitment,
        content: &[u8],
        now: Timestamp,
    ) -> Result<(), TimeLockError> {
        if now < commitment.lock_time {
            return Err(TimeLockError::LockStillActive {
                lock_time: commitment.lock_time,
            });
        }
        if !self.content.verify(content, &commitment.content_hash) {
            return Err(TimeLockError::ContentMismatch);
        }
        let expected = self.commitment_digest(&commitment.content_hash, &commitment.lock_time);
        if expected != commitment.commitment_hash {
            return Err(TimeLockError::CommitmentMismatch);
        }
        Ok(())
    }

    fn commitment_digest(&self, content_hash: &Digest, lock_time: &Timestamp) -> Digest {
        self.commitment
            .hash_parts(&[content_hash.as_bytes(), &lock_time.to_bytes()[..]])
    }
}

impl Default for TimeLock {
    fn default() -> Self {
        Self::new()
    }
}
