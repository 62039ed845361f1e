//! In-process cache store, used with `--no-persist` and in tests.

use crate::cache::{CacheEntry, CacheStore, EntrySummary, Invalidate};
use crate::clock::Clock;
use crate::error::CacheError;
use crate::models::{Fingerprint, Report};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct MemoryCacheStore {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
    validity: Duration,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
    pub fn new(validity: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            validity,
            clock,
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<Fingerprint, CacheEntry>> {
        // Entries are replaced whole; a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<Report>, CacheError> {
        let now = self.clock.now();
        Ok(self
            .guard()
            .get(fingerprint)
            .filter(|entry| entry.is_fresh(now, self.validity))
            .map(|entry| entry.report.clone()))
    }

    fn put(&self, fingerprint: &Fingerprint, report: &Report) -> Result<(), CacheError> {
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            report: report.clone(),
            created_at: self.clock.now(),
        };
        self.guard().insert(fingerprint.clone(), entry);
        Ok(())
    }

    fn invalidate(&self, target: &Invalidate) -> Result<usize, CacheError> {
        let mut entries = self.guard();
        Ok(match target {
            Invalidate::One(fingerprint) => usize::from(entries.remove(fingerprint).is_some()),
            Invalidate::All => {
                let removed = entries.len();
                entries.clear();
                removed
            }
        })
    }

    fn entries(&self) -> Result<Vec<EntrySummary>, CacheError> {
        let now = self.clock.now();
        let mut summaries: Vec<_> = self
            .guard()
            .values()
            .map(|entry| entry.summary(now, self.validity))
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let mut entries = self.guard();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, self.validity));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::validity_window;
    use crate::clock::ManualClock;
    use crate::models::{StageKind, Subject};
    use chrono::{TimeZone, Utc};

    fn setup() -> (Arc<ManualClock>, MemoryCacheStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
        ));
        let store = MemoryCacheStore::new(validity_window(24).unwrap(), clock.clone());
        (clock, store)
    }

    fn report(company: &str) -> Report {
        Report::pending(Subject::new(company, "Retail"), &StageKind::ALL, Utc::now())
    }

    #[test]
    fn test_put_then_lookup_returns_equal_report() {
        let (_clock, store) = setup();
        let report = report("Acme Corp");
        let fp = report.subject.fingerprint();

        store.put(&fp, &report).unwrap();

        assert_eq!(store.lookup(&fp).unwrap(), Some(report));
    }

    #[test]
    fn test_expired_entry_is_absent_but_stored() {
        let (clock, store) = setup();
        let report = report("Acme Corp");
        let fp = report.subject.fingerprint();
        store.put(&fp, &report).unwrap();

        clock.advance(Duration::hours(25));

        assert_eq!(store.lookup(&fp).unwrap(), None);
        assert_eq!(store.len(), 1);
        assert!(!store.entries().unwrap()[0].fresh);
    }

    #[test]
    fn test_purge_and_invalidate() {
        let (clock, store) = setup();
        let old = report("Old Co");
        store.put(&old.subject.fingerprint(), &old).unwrap();
        clock.advance(Duration::hours(30));
        let new = report("New Co");
        store.put(&new.subject.fingerprint(), &new).unwrap();

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len(), 1);

        assert_eq!(
            store
                .invalidate(&Invalidate::One(old.subject.fingerprint()))
                .unwrap(),
            0
        );
        assert_eq!(store.invalidate(&Invalidate::All).unwrap(), 1);
        assert!(store.is_empty());
    }
}
