//! In-memory record of `(name, version)` pairs already resolved in the
//! current pass.
//!
//! The resolver expands sibling edges concurrently, so membership checks and
//! additions must be observable as one atomic test-and-set: of two workers
//! racing on the same pair, exactly one wins the expansion.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct VisitedSet {
    inner: Mutex<HashMap<String, HashSet<String>>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `(name, version)` has already been recorded.
    pub fn contains(&self, name: &str, version: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .get(name)
            .is_some_and(|versions| versions.contains(version))
    }

    /// Record `(name, version)`, returning `true` iff it was not yet present.
    ///
    /// This is the linearization point for duplicate suppression: the caller
    /// that receives `true` owns the expansion of the pair.
    pub fn insert(&self, name: &str, version: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .insert(version.to_string())
    }

    /// Drop all recorded pairs. Called at the start of every pipeline run.
    pub fn reset(&self) {
        self.inner.lock().unwrap().clear();
    }
}
