//! Durable record of tarballs written by previous runs.
//!
//! The cache is a JSON index file mapping package name to the set of versions
//! whose tarballs have been written before. It records intent-of-presence
//! only: nobody verifies the tarball still exists on disk, and callers
//! tolerate stale positives by treating a missed file as a per-item failure.

use crate::{Result, error};
use snafu::ResultExt;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const INDEX_FILE: &str = "tarballs.json";

#[derive(Debug)]
pub struct TarballCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl TarballCache {
    /// Open the cache index inside `cache_dir`, loading entries persisted by
    /// earlier runs.
    ///
    /// A missing or unreadable index starts the cache empty rather than
    /// failing: the worst outcome of a lost index is re-downloading tarballs.
    pub fn open(cache_dir: &Path) -> Self {
        let path = cache_dir.join(INDEX_FILE);
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(
                        "Tarball cache index {} is corrupt ({err}), starting empty",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Whether a tarball for `(name, version)` was written by some prior run.
    pub fn exists(&self, name: &str, version: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(name)
            .is_some_and(|versions| versions.contains(version))
    }

    /// Record that the tarball for `(name, version)` has been written.
    pub fn add(&self, name: &str, version: &str) {
        self.entries
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .insert(version.to_string());
    }

    /// Persist the index to disk, creating the cache directory if needed.
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context(error::CacheFlushSnafu {
                path: self.path.clone(),
            })?;
        }

        let encoded = {
            let entries = self.entries.lock().unwrap();
            serde_json::to_string_pretty(&*entries).context(error::CacheEncodeSnafu)?
        };
        std::fs::write(&self.path, encoded).context(error::CacheFlushSnafu {
            path: self.path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_without_an_index_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = TarballCache::open(temp_dir.path());
        assert!(!cache.exists("a", "1.0.0"));
    }

    #[test]
    fn add_then_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = TarballCache::open(temp_dir.path());
        cache.add("a", "1.0.0");
        assert!(cache.exists("a", "1.0.0"));
        assert!(!cache.exists("a", "2.0.0"));
        assert!(!cache.exists("b", "1.0.0"));
    }

    #[test]
    fn entries_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();

        let cache = TarballCache::open(temp_dir.path());
        cache.add("@scope/pkg", "1.2.3");
        cache.add("plain", "0.1.0");
        cache.flush().unwrap();

        let reopened = TarballCache::open(temp_dir.path());
        assert!(reopened.exists("@scope/pkg", "1.2.3"));
        assert!(reopened.exists("plain", "0.1.0"));
        assert!(!reopened.exists("plain", "0.2.0"));
    }

    #[test]
    fn flush_creates_the_cache_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("nested").join("cache");

        let cache = TarballCache::open(&nested);
        cache.add("a", "1.0.0");
        cache.flush().unwrap();

        assert!(TarballCache::open(&nested).exists("a", "1.0.0"));
    }

    #[test]
    fn corrupt_index_starts_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join(INDEX_FILE), "not json{{").unwrap();

        let cache = TarballCache::open(temp_dir.path());
        assert!(!cache.exists("a", "1.0.0"));
    }
}
