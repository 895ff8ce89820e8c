//! Memory Tier Module
//!
//! Bounded in-process map with LRU eviction, item/byte ceilings and a TTL.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::{CacheEntry, LruTracker};

// == Lookup ==
/// Outcome of a tier read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Live entry; its access time has been refreshed
    Hit(CacheEntry),
    /// Entry existed but its TTL had elapsed; it has been removed
    Expired,
    /// No entry under that key
    Miss,
}

// == Insertion ==
/// Outcome of a tier write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Insertion {
    /// False when the item alone exceeded the tier's ceilings
    pub inserted: bool,
    /// Live entries removed to make room, least recently used first
    pub evicted: Vec<String>,
    /// Already-expired entries removed to make room
    pub expired: Vec<String>,
}

impl Insertion {
    pub fn rejected() -> Self {
        Self::default()
    }

    /// Every key the write pushed out of the tier.
    pub fn removed_keys(&self) -> impl Iterator<Item = &String> {
        self.expired.iter().chain(self.evicted.iter())
    }
}

// == Memory Tier ==
/// In-memory accelerator tier.
#[derive(Debug)]
pub struct MemoryTier {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    total_size_bytes: u64,
    max_items: usize,
    max_size_bytes: u64,
    ttl_seconds: f64,
}

impl MemoryTier {
    // == Constructor ==
    pub fn new(max_items: usize, max_size_bytes: u64, ttl_seconds: f64) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            total_size_bytes: 0,
            max_items,
            max_size_bytes,
            ttl_seconds,
        }
    }

    // == Get ==
    /// Looks up `key` at time `now`.
    ///
    /// A hit refreshes `last_accessed_at` and moves the key to the most
    /// recently used position. Expired entries are dropped on discovery.
    pub fn get(&mut self, key: &str, now: f64) -> Lookup {
        let Some(entry) = self.entries.get_mut(key) else {
            return Lookup::Miss;
        };

        if entry.is_expired(now, self.ttl_seconds) {
            debug!(key, "memory entry expired");
            self.delete(key);
            return Lookup::Expired;
        }

        entry.last_accessed_at = now;
        let hit = entry.clone();
        self.lru.touch(key, hit.last_accessed_at, hit.written_at);
        Lookup::Hit(hit)
    }

    // == Put ==
    /// Inserts or replaces an entry, then evicts until within ceilings.
    ///
    /// The new entry is never its own eviction victim. An entry that cannot
    /// fit even in an empty tier is refused and any older copy under the same
    /// key is dropped.
    pub fn put(&mut self, entry: CacheEntry) -> Insertion {
        if self.max_items == 0 || entry.size_bytes > self.max_size_bytes {
            debug!(
                key = %entry.key,
                size_bytes = entry.size_bytes,
                max_size_bytes = self.max_size_bytes,
                "memory tier refused oversized entry"
            );
            self.delete(&entry.key);
            return Insertion::rejected();
        }

        let key = entry.key.clone();
        self.lru
            .touch(&key, entry.last_accessed_at, entry.written_at);
        self.total_size_bytes += entry.size_bytes;
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            self.total_size_bytes -= previous.size_bytes;
        }

        let mut evicted = Vec::new();
        while self.over_capacity() {
            let Some(victim) = self.lru.oldest_except(&key).cloned() else {
                break;
            };
            self.delete(&victim);
            evicted.push(victim);
        }

        if !evicted.is_empty() {
            debug!(count = evicted.len(), "memory tier evicted entries");
        }

        Insertion {
            inserted: true,
            evicted,
            expired: Vec::new(),
        }
    }

    // == Delete ==
    /// Removes `key`; returns whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.lru.remove(key);
                self.total_size_bytes -= entry.size_bytes;
                true
            }
            None => false,
        }
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.total_size_bytes = 0;
    }

    /// Raw presence check that ignores TTL and leaves LRU order alone.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size_bytes
    }

    pub fn ttl_seconds(&self) -> f64 {
        self.ttl_seconds
    }

    fn over_capacity(&self) -> bool {
        self.entries.len() > self.max_items || self.total_size_bytes > self.max_size_bytes
    }
}
