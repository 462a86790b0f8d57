use core::sync::atomic::{AtomicU64, Ordering};

/// Counters of cache activity since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a cached slot
    pub hits: u64,
    /// Lookups that had to claim a slot
    pub misses: u64,
    /// Misses that took a slot away from another block
    pub evictions: u64,
    /// Device reads issued by `read`
    pub fills: u64,
    /// Device writes issued by `write`
    pub writes: u64,
}

#[derive(Default)]
pub(crate) struct Stats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    fills: AtomicU64,
    writes: AtomicU64,
}

impl Stats {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }
    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
    pub fn eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }
    pub fn fill(&self) {
        self.fills.fetch_add(1, Ordering::Relaxed);
    }
    pub fn write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            fills: self.fills.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}
