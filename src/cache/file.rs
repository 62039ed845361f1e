//! File-backed cache store: one JSON document per fingerprint.

use crate::cache::{CacheEntry, CacheStore, EntrySummary, Invalidate};
use crate::clock::Clock;
use crate::error::CacheError;
use crate::models::{Fingerprint, Report};
use chrono::Duration;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use walkdir::WalkDir;

const ENTRY_EXTENSION: &str = "json";

/// Cache store rooted at a directory.
///
/// Writes go to a temporary file that is renamed over the entry, so readers
/// never observe a partially written document. Writes to the same
/// fingerprint are serialized.
pub struct FileCacheStore {
    dir: PathBuf,
    validity: Duration,
    clock: Arc<dyn Clock>,
    write_locks: Mutex<HashMap<Fingerprint, Arc<Mutex<()>>>>,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>, validity: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            validity,
            clock,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir
            .join(format!("{}.{}", fingerprint.file_stem(), ENTRY_EXTENSION))
    }

    fn write_lock(&self, fingerprint: &Fingerprint) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(fingerprint.clone()).or_default().clone()
    }

    fn read_entry(path: &Path) -> Result<CacheEntry, CacheError> {
        let content = fs::read_to_string(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    fn remove(path: &Path) -> Result<bool, CacheError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Paths of every entry document in the cache directory.
    fn entry_paths(&self) -> Result<Vec<PathBuf>, CacheError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
            {
                paths.push(path.to_path_buf());
            }
        }
        Ok(paths)
    }
}

impl CacheStore for FileCacheStore {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<Report>, CacheError> {
        let path = self.path_for(fingerprint);
        if !path.exists() {
            debug!("Cache miss for {}", fingerprint);
            return Ok(None);
        }

        let entry = Self::read_entry(&path)?;
        if entry.fingerprint != *fingerprint {
            warn!(
                "Cache file {} holds {} instead of {}",
                path.display(),
                entry.fingerprint,
                fingerprint
            );
            return Ok(None);
        }

        if !entry.is_fresh(self.clock.now(), self.validity) {
            debug!(
                "Cache entry for {} expired (created {})",
                fingerprint, entry.created_at
            );
            return Ok(None);
        }

        debug!("Cache hit for {}", fingerprint);
        Ok(Some(entry.report))
    }

    fn put(&self, fingerprint: &Fingerprint, report: &Report) -> Result<(), CacheError> {
        let lock = self.write_lock(fingerprint);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            report: report.clone(),
            created_at: self.clock.now(),
        };
        let json = serde_json::to_string_pretty(&entry)?;

        let path = self.path_for(fingerprint);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;

        debug!("Cached report for {} at {}", fingerprint, path.display());
        Ok(())
    }

    fn invalidate(&self, target: &Invalidate) -> Result<usize, CacheError> {
        match target {
            Invalidate::One(fingerprint) => {
                let removed = Self::remove(&self.path_for(fingerprint))?;
                Ok(usize::from(removed))
            }
            Invalidate::All => {
                let mut removed = 0;
                for path in self.entry_paths()? {
                    if Self::remove(&path)? {
                        removed += 1;
                    }
                }
                Ok(removed)
            }
        }
    }

    fn entries(&self) -> Result<Vec<EntrySummary>, CacheError> {
        let now = self.clock.now();
        let mut summaries = Vec::new();

        for path in self.entry_paths()? {
            match Self::read_entry(&path) {
                Ok(entry) => summaries.push(entry.summary(now, self.validity)),
                Err(e) => warn!("Skipping unreadable cache entry: {}", e),
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let mut removed = 0;

        for path in self.entry_paths()? {
            let expired = match Self::read_entry(&path) {
                Ok(entry) => !entry.is_fresh(now, self.validity),
                Err(CacheError::Corrupt { .. }) => true,
                Err(e) => return Err(e),
            };
            if expired && Self::remove(&path)? {
                debug!("Purged {}", path.display());
                removed += 1;
            }
        }

        Ok(removed)
    }
}
