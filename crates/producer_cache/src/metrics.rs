//! Cache metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Lock-free counters for one producer cache
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Acquisitions served from an existing entry
    hits: AtomicU64,
    /// Acquisitions that opened a producer
    misses: AtomicU64,
    /// Entries evicted to honor the bound
    evictions: AtomicU64,
    /// Failed open attempts
    open_failures: AtomicU64,
    /// Current entry count
    entries: AtomicUsize,
}

impl CacheMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Total cache hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Increment hit count
    pub fn inc_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Total cache misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Increment miss count
    pub fn inc_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Increment eviction count
    pub fn inc_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Total failed opens
    pub fn open_failures(&self) -> u64 {
        self.open_failures.load(Ordering::Relaxed)
    }

    /// Increment failed-open count
    pub fn inc_open_failures(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current entry count
    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    /// Record the current entry count
    pub fn set_entries(&self, count: usize) {
        self.entries.store(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            open_failures: self.open_failures(),
            entries: self.entries(),
        }
    }
}

/// Point-in-time view of `CacheMetrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub open_failures: u64,
    pub entries: usize,
}
