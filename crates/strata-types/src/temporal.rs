use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Hybrid logical timestamp used as an ordering token.
///
/// Combines a physical wall-clock component with a logical counter and a
/// node identifier, so two timestamps taken within the same millisecond
/// still order strictly.
///
/// Ordering: `physical_ms` → `logical` → `node_id` (total order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for events at the same physical time.
    pub logical: u32,
    /// Node identifier to break ties between writers.
    pub node_id: u16,
}

/// Length of [`Timestamp::to_bytes`].
pub const TIMESTAMP_BYTES: usize = 14;

impl Timestamp {
    pub fn new(physical_ms: u64, logical: u32, node_id: u16) -> Self {
        Self {
            physical_ms,
            logical,
            node_id,
        }
    }

    /// A timestamp at the given millisecond with no logical component.
    pub fn from_millis(physical_ms: u64) -> Self {
        Self::new(physical_ms, 0, 0)
    }

    /// The zero timestamp.
    pub const fn zero() -> Self {
        Self {
            physical_ms: 0,
            logical: 0,
            node_id: 0,
        }
    }

    /// A timestamp for the current wall-clock time.
    pub fn wall_clock(node_id: u16) -> Self {
        let physical_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self::new(physical_ms, 0, node_id)
    }

    /// Canonical byte encoding fed into digest inputs:
    /// `physical_ms (u64 BE) ‖ logical (u32 BE) ‖ node_id (u16 BE)`.
    pub fn to_bytes(&self) -> [u8; TIMESTAMP_BYTES] {
        let mut out = [0u8; TIMESTAMP_BYTES];
        out[..8].copy_from_slice(&self.physical_ms.to_be_bytes());
        out[8..12].copy_from_slice(&self.logical.to_be_bytes());
        out[12..].copy_from_slice(&self.node_id.to_be_bytes());
        out
    }

    /// Convert a UTC datetime (millisecond precision).
    pub fn from_datetime(dt: DateTime<Utc>) -> Result<Self, TypeError> {
        let ms = dt.timestamp_millis();
        if ms < 0 {
            return Err(TypeError::InvalidTimestamp(format!(
                "{dt} is before the UNIX epoch"
            )));
        }
        Ok(Self::from_millis(ms as u64))
    }

    /// Parse an RFC 3339 datetime such as `2026-12-31T00:00:00Z`.
    pub fn parse_rfc3339(s: &str) -> Result<Self, TypeError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| TypeError::InvalidTimestamp(format!("{s}: {e}")))?;
        Self::from_datetime(dt.with_timezone(&Utc))
    }

    /// The physical component as a UTC datetime, if representable.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.physical_ms)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    /// RFC 3339 rendering of the physical component.
    pub fn to_rfc3339(&self) -> String {
        match self.to_datetime() {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => format!("{}ms", self.physical_ms),
        }
    }

    /// Returns `true` if this timestamp is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns `true` if this timestamp is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
            .then(self.node_id.cmp(&other.node_id))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timestamp({}ms.{}.n{})",
            self.physical_ms, self.logical, self.node_id
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.n{}",
            self.physical_ms, self.logical, self.node_id
        )
    }
}
