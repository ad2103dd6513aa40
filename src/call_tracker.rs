use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Counts how many requests reached each route path.
///
/// Existing paths are bumped under a shared read lock, so increments on
/// different paths never wait on each other. The map is write-locked only
/// when a path is seen for the first time.
#[derive(Default)]
pub struct CallTracker {
    counts: RwLock<HashMap<String, AtomicU64>>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call to `path` and return the path's new total.
    pub fn track_call(&self, path: &str) -> u64 {
        {
            let counts = self.counts.read().unwrap_or_else(|e| e.into_inner());
            if let Some(counter) = counts.get(path) {
                return counter.fetch_add(1, Ordering::Relaxed) + 1;
            }
        }

        let mut counts = self.counts.write().unwrap_or_else(|e| e.into_inner());
        counts
            .entry(path.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed)
            + 1
    }

    pub fn get_counts(&self) -> BTreeMap<String, u64> {
        let counts = self.counts.read().unwrap_or_else(|e| e.into_inner());
        counts
            .iter()
            .map(|(path, count)| (path.clone(), count.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn count_for(&self, path: &str) -> u64 {
        let counts = self.counts.read().unwrap_or_else(|e| e.into_inner());
        counts
            .get(path)
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}
