//! Cache statistics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about the cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently held in memory
    pub memory_entries: usize,
    /// Reads served from memory
    pub memory_hits: u64,
    /// Reads served from disk (and promoted)
    pub disk_hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Values that could not be encoded or persisted
    pub write_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    write_failures: AtomicU64,
}

impl Counters {
    pub fn memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, memory_entries: usize) -> CacheStats {
        CacheStats {
            memory_entries,
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.memory_entries, 0);
        assert_eq!(stats.memory_hits, 0);
        assert_eq!(stats.disk_hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.write_failures, 0);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        counters.memory_hit();
        counters.memory_hit();
        counters.disk_hit();
        counters.miss();
        counters.write_failure();

        let stats = counters.snapshot(5);
        assert_eq!(
            stats,
            CacheStats {
                memory_entries: 5,
                memory_hits: 2,
                disk_hits: 1,
                misses: 1,
                write_failures: 1,
            }
        );
    }

    #[test]
    fn test_cache_stats_serialization() {
        let stats = CacheStats {
            memory_entries: 12,
            memory_hits: 500,
            disk_hits: 40,
            misses: 7,
            write_failures: 1,
        };

        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"memory_hits\":500"));
        assert!(json.contains("\"disk_hits\":40"));

        let deserialized: CacheStats = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, stats);
    }
}
