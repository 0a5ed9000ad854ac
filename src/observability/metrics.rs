//! Attribute metrics registry
//!
//! - Counters only, monotonic, reset only on process start
//! - Relaxed atomics: readers and the writer bump them without coordination

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one attribute (or a group sharing a registry)
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    docs_added: AtomicU64,
    commits: AtomicU64,
    changes_applied: AtomicU64,
    buffers_retired: AtomicU64,
    buffers_reclaimed: AtomicU64,
    saves: AtomicU64,
    bytes_saved: AtomicU64,
    loads: AtomicU64,
    searches_created: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_docs_added(&self) {
        self.docs_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_changes_applied(&self, count: u64) {
        self.changes_applied.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_buffers_retired(&self) {
        self.buffers_retired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_buffers_reclaimed(&self, count: u64) {
        self.buffers_reclaimed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record one completed save of `bytes` bytes
    pub fn record_save(&self, bytes: u64) {
        self.saves.fetch_add(1, Ordering::Relaxed);
        self.bytes_saved.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_loads(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_searches_created(&self) {
        self.searches_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            docs_added: self.docs_added.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            changes_applied: self.changes_applied.load(Ordering::Relaxed),
            buffers_retired: self.buffers_retired.load(Ordering::Relaxed),
            buffers_reclaimed: self.buffers_reclaimed.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            bytes_saved: self.bytes_saved.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            searches_created: self.searches_created.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub docs_added: u64,
    pub commits: u64,
    pub changes_applied: u64,
    pub buffers_retired: u64,
    pub buffers_reclaimed: u64,
    pub saves: u64,
    pub bytes_saved: u64,
    pub loads: u64,
    pub searches_created: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.commits, 0);
        assert_eq!(snapshot.docs_added, 0);
        assert_eq!(snapshot.buffers_reclaimed, 0);
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();

        registry.increment_docs_added();
        registry.increment_docs_added();
        registry.increment_commits();
        registry.add_changes_applied(5);
        registry.increment_buffers_retired();
        registry.add_buffers_reclaimed(1);
        registry.record_save(10);
        registry.increment_loads();
        registry.increment_searches_created();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.docs_added, 2);
        assert_eq!(snapshot.commits, 1);
        assert_eq!(snapshot.changes_applied, 5);
        assert_eq!(snapshot.buffers_retired, 1);
        assert_eq!(snapshot.buffers_reclaimed, 1);
        assert_eq!(snapshot.saves, 1);
        assert_eq!(snapshot.bytes_saved, 10);
        assert_eq!(snapshot.loads, 1);
        assert_eq!(snapshot.searches_created, 1);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.add_changes_applied(1234);
        registry.increment_commits();

        let parsed: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(parsed["changes_applied"], 1234);
        assert_eq!(parsed["commits"], 1);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        reg.increment_searches_created();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().searches_created, 800);
    }
}
