//! Report cache keyed by subject fingerprint.
//!
//! An entry is served only while it is younger than the validity window.
//! Expired entries stay on disk until they are purged or overwritten.

pub mod file;
pub mod memory;

pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;

use crate::error::{CacheError, ConfigError};
use crate::models::{Fingerprint, Report};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default validity window, in hours.
pub const DEFAULT_VALIDITY_HOURS: u64 = 24;

/// Longest accepted validity window (ten years), in hours.
pub const MAX_VALIDITY_HOURS: u64 = 24 * 365 * 10;

/// A stored report with its creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub report: Report,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// True while `now - created_at` is strictly below `validity`.
    pub fn is_fresh(&self, now: DateTime<Utc>, validity: Duration) -> bool {
        now - self.created_at < validity
    }

    pub fn summary(&self, now: DateTime<Utc>, validity: Duration) -> EntrySummary {
        EntrySummary {
            fingerprint: self.fingerprint.clone(),
            company: self.report.subject.company.clone(),
            industry: self.report.subject.industry.clone(),
            created_at: self.created_at,
            fresh: self.is_fresh(now, validity),
            degraded: self.report.is_degraded(),
        }
    }
}

/// What to remove from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidate {
    One(Fingerprint),
    All,
}

/// Listing row for a stored entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    pub fingerprint: Fingerprint,
    pub company: String,
    pub industry: String,
    pub created_at: DateTime<Utc>,
    pub fresh: bool,
    pub degraded: bool,
}

/// Persistent store of finished reports.
///
/// Callers decide how to recover from errors: the batch coordinator treats a
/// failed lookup as a miss and only logs a failed put.
pub trait CacheStore: Send + Sync {
    /// The stored report for `fingerprint`, if one exists and is still fresh.
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<Report>, CacheError>;

    /// Insert or replace the entry, stamping it with the current time.
    fn put(&self, fingerprint: &Fingerprint, report: &Report) -> Result<(), CacheError>;

    /// Remove entries; returns how many were removed.
    fn invalidate(&self, target: &Invalidate) -> Result<usize, CacheError>;

    /// Every stored entry, newest first, including expired ones.
    fn entries(&self) -> Result<Vec<EntrySummary>, CacheError>;

    /// Physically remove expired entries; returns how many were removed.
    fn purge_expired(&self) -> Result<usize, CacheError>;
}

/// Convert a window in hours to a chrono duration.
///
/// Accepts `1..=MAX_VALIDITY_HOURS`.
pub fn validity_window(hours: u64) -> Result<Duration, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        field: "cache.validity_hours",
        reason,
    };

    if hours == 0 {
        return Err(invalid("must be greater than zero".to_string()));
    }
    if hours > MAX_VALIDITY_HOURS {
        return Err(invalid(format!("must be at most {}", MAX_VALIDITY_HOURS)));
    }

    i64::try_from(hours)
        .ok()
        .and_then(Duration::try_hours)
        .ok_or_else(|| invalid("out of range".to_string()))
}
