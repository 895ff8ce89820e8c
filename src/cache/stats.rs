//! Cache Statistics Module
//!
//! Tracks hits per tier, misses, promotions, evictions and invalidations.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache behaviour across both tiers.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheStats {
    /// Lookups answered by the memory tier
    pub memory_hits: u64,
    /// Lookups answered by the disk tier after a memory miss
    pub disk_hits: u64,
    /// Lookups that found nothing usable in either tier
    pub misses: u64,
    /// Disk hits copied back into memory
    pub promotions: u64,
    /// Entries pushed out of memory by capacity pressure
    pub memory_evictions: u64,
    /// Entries permanently dropped from disk by capacity pressure
    pub disk_evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Entries dropped because their schema tag was stale
    pub schema_invalidations: u64,
    /// Writes refused because the item alone exceeded the disk ceiling
    pub rejections: u64,
    /// Current number of entries in memory
    pub memory_entries: usize,
    /// Current number of entries on disk
    pub disk_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the overall hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_promotion(&mut self) {
        self.promotions += 1;
    }

    pub fn record_memory_evictions(&mut self, count: usize) {
        self.memory_evictions += count as u64;
    }

    pub fn record_disk_evictions(&mut self, count: usize) {
        self.disk_evictions += count as u64;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn record_schema_invalidation(&mut self) {
        self.schema_invalidations += 1;
    }

    pub fn record_rejection(&mut self) {
        self.rejections += 1;
    }

    // == Update Entry Counts ==
    pub fn set_entry_counts(&mut self, memory: usize, disk: usize) {
        self.memory_entries = memory;
        self.disk_entries = disk;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.memory_hits, 0);
        assert_eq!(stats.disk_hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.memory_evictions, 0);
        assert_eq!(stats.disk_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_counts_both_tiers() {
        let mut stats = CacheStats::new();
        stats.record_memory_hit();
        stats.record_disk_hit();
        stats.record_miss();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_record_evictions() {
        let mut stats = CacheStats::new();
        stats.record_memory_evictions(2);
        stats.record_disk_evictions(3);
        stats.record_memory_evictions(0);
        assert_eq!(stats.memory_evictions, 2);
        assert_eq!(stats.disk_evictions, 3);
    }

    #[test]
    fn test_stats_serialize() {
        let mut stats = CacheStats::new();
        stats.record_promotion();
        stats.set_entry_counts(1, 4);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["promotions"], 1);
        assert_eq!(json["memory_entries"], 1);
        assert_eq!(json["disk_entries"], 4);
    }
}
