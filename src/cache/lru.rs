//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

// == LRU Rank ==
/// Position of a key in eviction order.
///
/// Ordered by `last_accessed_at`, then `written_at`, then touch sequence, so
/// caller-supplied timestamps that repeat or run backwards still produce a
/// total order.
#[derive(Debug, Clone, Copy)]
struct Rank {
    last_accessed_at: f64,
    written_at: f64,
    seq: u64,
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.last_accessed_at
            .total_cmp(&other.last_accessed_at)
            .then_with(|| self.written_at.total_cmp(&other.written_at))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Rank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rank {}

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// The first key in `order` is the least recently used.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Keys by eviction rank
    order: BTreeMap<Rank, String>,
    /// Current rank of each tracked key
    ranks: HashMap<String, Rank>,
    /// Monotonic counter for the final tie-break
    seq: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Records an access to `key` at `last_accessed_at`.
    ///
    /// Replaces any previous rank for the key.
    pub fn touch(&mut self, key: &str, last_accessed_at: f64, written_at: f64) {
        self.remove(key);
        self.seq += 1;
        let rank = Rank {
            last_accessed_at,
            written_at,
            seq: self.seq,
        };
        self.order.insert(rank, key.to_string());
        self.ranks.insert(key.to_string(), rank);
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        if let Some(rank) = self.ranks.remove(key) {
            self.order.remove(&rank);
        }
    }

    // == Oldest Except ==
    /// Returns the least recently used key other than `skip`.
    pub fn oldest_except(&self, skip: &str) -> Option<&String> {
        self.order.values().find(|k| k.as_str() != skip)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
        self.ranks.clear();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn oldest(lru: &LruTracker) -> Option<&str> {
        lru.order.values().next().map(String::as_str)
    }

    fn tracked(lru: &LruTracker) -> Vec<&str> {
        lru.order.values().map(String::as_str).collect()
    }

    #[test]
    fn test_lru_new() {
        let lru = LruTracker::new();
        assert_eq!(oldest(&lru), None);
        assert!(lru.ranks.is_empty());
    }

    #[test]
    fn test_lru_touch_new_key() {
        let mut lru = LruTracker::new();

        lru.touch("key1", 1.0, 1.0);
        lru.touch("key2", 2.0, 2.0);
        lru.touch("key3", 3.0, 3.0);

        assert_eq!(tracked(&lru), vec!["key1", "key2", "key3"]);
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let mut lru = LruTracker::new();

        lru.touch("key1", 1.0, 1.0);
        lru.touch("key2", 2.0, 2.0);
        lru.touch("key3", 3.0, 3.0);

        // Read key1 again - should move to the back of the eviction queue
        lru.touch("key1", 4.0, 1.0);

        assert_eq!(tracked(&lru), vec!["key2", "key3", "key1"]);
    }

    #[test]
    fn test_lru_tie_broken_by_written_at() {
        let mut lru = LruTracker::new();

        // Same access time, b was written earlier
        lru.touch("a", 10.0, 5.0);
        lru.touch("b", 10.0, 2.0);

        assert_eq!(tracked(&lru), vec!["b", "a"]);
    }

    #[test]
    fn test_lru_full_tie_broken_by_touch_order() {
        let mut lru = LruTracker::new();

        lru.touch("a", 0.0, 0.0);
        lru.touch("b", 0.0, 0.0);
        lru.touch("c", 0.0, 0.0);

        assert_eq!(tracked(&lru), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_lru_orders_by_timestamp_not_touch_order() {
        let mut lru = LruTracker::new();

        // Caller-supplied timestamps arriving out of order
        lru.touch("late", 50.0, 50.0);
        lru.touch("early", 10.0, 10.0);

        assert_eq!(oldest(&lru), Some("early"));
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch("key1", 1.0, 1.0);
        lru.touch("key2", 2.0, 2.0);
        lru.touch("key3", 3.0, 3.0);

        lru.remove("key2");
        lru.remove("nonexistent");

        assert_eq!(tracked(&lru), vec!["key1", "key3"]);
        assert_eq!(lru.ranks.len(), 2);
    }

    #[test]
    fn test_lru_touch_same_key_multiple_times() {
        let mut lru = LruTracker::new();

        lru.touch("key1", 1.0, 1.0);
        lru.touch("key1", 2.0, 1.0);
        lru.touch("key1", 3.0, 1.0);

        assert_eq!(tracked(&lru), vec!["key1"]);
        assert_eq!(lru.ranks.len(), 1);
    }

    #[test]
    fn test_lru_oldest_except() {
        let mut lru = LruTracker::new();

        lru.touch("a", 1.0, 1.0);
        lru.touch("b", 2.0, 2.0);

        assert_eq!(lru.oldest_except("a"), Some(&"b".to_string()));
        assert_eq!(lru.oldest_except("b"), Some(&"a".to_string()));

        lru.remove("b");
        assert_eq!(lru.oldest_except("a"), None);
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = LruTracker::new();

        lru.touch("a", 1.0, 1.0);
        lru.touch("b", 2.0, 2.0);
        lru.clear();

        assert_eq!(oldest(&lru), None);
        assert!(lru.ranks.is_empty());
    }
}
