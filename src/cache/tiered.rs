//! Tiered Cache Module
//!
//! Public façade coordinating the memory and disk tiers.
//!
//! Disk is authoritative: every key in memory is also live on disk. Writes go
//! to disk first and only then to memory, and any key the disk tier drops is
//! dropped from memory in the same locked section.

use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use crate::cache::{
    current_timestamp, CacheEntry, CacheStats, Cacheable, DiskTier, Insertion, Lookup,
    MemoryTier, SchemaCodec,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::storage::{EntryStore, SqliteStore};

// == Tiers ==
/// Everything guarded by the coordinator lock.
#[derive(Debug)]
struct Tiers<S: EntryStore> {
    memory: MemoryTier,
    disk: DiskTier<S>,
    stats: CacheStats,
    max_item_size_bytes: u64,
}

impl<S: EntryStore> Tiers<S> {
    /// Memory first, then disk with promotion. Returns the entry whose
    /// schema tag matched `expected`.
    ///
    /// A memory hit is also recorded as an access on disk, so disk LRU
    /// order reflects every successful read.
    fn lookup(&mut self, key: &str, now: f64, expected: &str) -> Result<Option<CacheEntry>> {
        match self.memory.get(key, now) {
            Lookup::Hit(entry) => {
                if self.is_stale(&entry, expected) {
                    self.invalidate(key)?;
                    return Ok(None);
                }
                self.disk.touch(key, now)?;
                self.stats.record_memory_hit();
                return Ok(Some(entry));
            }
            Lookup::Expired => self.stats.record_expirations(1),
            Lookup::Miss => {}
        }

        match self.disk.get(key, now)? {
            Lookup::Hit(entry) => {
                if self.is_stale(&entry, expected) {
                    self.invalidate(key)?;
                    return Ok(None);
                }
                self.stats.record_disk_hit();
                self.promote(&entry, now);
                Ok(Some(entry))
            }
            Lookup::Expired => {
                self.stats.record_expirations(1);
                self.stats.record_miss();
                Ok(None)
            }
            Lookup::Miss => {
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    fn is_stale(&self, entry: &CacheEntry, expected: &str) -> bool {
        SchemaCodec::check_version(&entry.schema_version, expected).is_err()
    }

    /// Drops a stale-schema entry from both tiers and counts a miss.
    fn invalidate(&mut self, key: &str) -> Result<()> {
        info!(key, "dropping entry written under another schema version");
        self.memory.delete(key);
        self.disk.delete(key)?;
        self.stats.record_schema_invalidation();
        self.stats.record_miss();
        Ok(())
    }

    /// Copies a disk hit into memory if it is small enough.
    ///
    /// The copy's `written_at` is pulled back so that it expires from memory
    /// no later than its original expires from disk.
    fn promote(&mut self, entry: &CacheEntry, now: f64) {
        if entry.size_bytes > self.max_item_size_bytes {
            return;
        }

        let disk_expiry = entry.written_at + self.disk.ttl_seconds();
        let mut copy = entry.clone();
        copy.written_at = now.min(disk_expiry - self.memory.ttl_seconds());
        copy.last_accessed_at = now;

        let insertion = self.memory.put(copy);
        if insertion.inserted {
            debug!(key = %entry.key, "promoted disk entry into memory");
            self.stats.record_promotion();
        }
        self.stats.record_memory_evictions(insertion.evicted.len());
    }

    fn put(&mut self, entry: CacheEntry) -> Result<()> {
        let key = entry.key.clone();
        let disk_only = entry.size_bytes > self.max_item_size_bytes;
        let memory_copy = (!disk_only).then(|| entry.clone());

        let insertion = self.disk.put(entry)?;
        self.forget_disk_removals(&insertion);

        let Some(memory_copy) = memory_copy.filter(|_| insertion.inserted) else {
            // Disk-only, or refused by disk: no older memory copy may linger
            self.memory.delete(&key);
            if !insertion.inserted {
                self.stats.record_rejection();
            } else {
                debug!(key = %key, "stored disk-only");
            }
            return Ok(());
        };

        let memory_insertion = self.memory.put(memory_copy);
        self.stats
            .record_memory_evictions(memory_insertion.evicted.len());
        Ok(())
    }

    /// Keeps memory a subset of disk after a disk write.
    fn forget_disk_removals(&mut self, insertion: &Insertion) {
        for key in insertion.removed_keys() {
            self.memory.delete(key);
        }
        self.stats.record_disk_evictions(insertion.evicted.len());
        self.stats.record_expirations(insertion.expired.len());
    }
}

// == Tiered Cache ==
/// Two-tier cache of `T` values.
///
/// All operations take an optional `timestamp` (Unix seconds) that defaults
/// to the wall clock; pass one explicitly for deterministic behaviour.
#[derive(Debug)]
pub struct TieredCache<T: Cacheable, S: EntryStore = SqliteStore> {
    /// `None` once closed
    inner: Mutex<Option<Tiers<S>>>,
    _value: PhantomData<fn() -> T>,
}

impl<T: Cacheable> TieredCache<T, SqliteStore> {
    // == Open ==
    /// Opens a cache backed by the SQLite database at `config.db_path`.
    pub fn open(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let store = SqliteStore::open(&config.db_path)?;
        Self::with_store(store, config)
    }
}

impl<T: Cacheable, S: EntryStore> TieredCache<T, S> {
    /// Builds a cache over an already opened store.
    pub fn with_store(store: S, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let disk = DiskTier::open(
            store,
            config.max_disk_items,
            config.max_disk_size_bytes,
            config.disk_ttl_seconds,
        )?;
        let memory = MemoryTier::new(
            config.max_memory_items,
            config.max_memory_size_bytes,
            config.memory_ttl_seconds,
        );
        info!(
            schema_version = T::SCHEMA_VERSION,
            db_path = %config.db_path.display(),
            "tiered cache opened"
        );

        Ok(Self {
            inner: Mutex::new(Some(Tiers {
                memory,
                disk,
                stats: CacheStats::new(),
                max_item_size_bytes: config.max_item_size_bytes,
            })),
            _value: PhantomData,
        })
    }

    // == Get ==
    /// Returns the value under `key`, or `None` if absent, expired or
    /// written under another schema version.
    ///
    /// A disk hit small enough for memory is promoted.
    pub fn get(&self, key: &str, timestamp: Option<f64>) -> Result<Option<T>> {
        let now = timestamp.unwrap_or_else(current_timestamp);
        let mut guard = self.lock()?;
        let tiers = open_tiers(&mut guard)?;

        match tiers.lookup(key, now, T::SCHEMA_VERSION)? {
            Some(entry) => Ok(Some(SchemaCodec::decode_as(
                &entry.payload,
                &entry.schema_version,
            )?)),
            None => Ok(None),
        }
    }

    // == Put ==
    /// Stores `value` under `key`.
    ///
    /// Large values go to disk only; others are written through to both
    /// tiers, disk first. A disk failure leaves memory untouched.
    pub fn put(&self, key: &str, value: &T, timestamp: Option<f64>) -> Result<()> {
        let now = timestamp.unwrap_or_else(current_timestamp);
        let encoded = SchemaCodec::encode(value)?;
        let entry = CacheEntry::new(key, encoded.bytes, encoded.schema_version, now);

        let mut guard = self.lock()?;
        open_tiers(&mut guard)?.put(entry)
    }

    // == Delete ==
    /// Removes `key` from both tiers. Deleting a missing key is not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut guard = self.lock()?;
        let tiers = open_tiers(&mut guard)?;
        tiers.memory.delete(key);
        tiers.disk.delete(key)
    }

    // == Exists ==
    /// Same TTL, schema and promotion rules as `get`, without decoding.
    pub fn exists(&self, key: &str, timestamp: Option<f64>) -> Result<bool> {
        let now = timestamp.unwrap_or_else(current_timestamp);
        let mut guard = self.lock()?;
        let tiers = open_tiers(&mut guard)?;
        Ok(tiers.lookup(key, now, T::SCHEMA_VERSION)?.is_some())
    }

    // == Clear ==
    /// Empties both tiers.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.lock()?;
        let tiers = open_tiers(&mut guard)?;
        tiers.memory.clear();
        tiers.disk.clear()?;
        info!("tiered cache cleared");
        Ok(())
    }

    // == Totals ==
    /// Aggregate payload bytes on disk.
    pub fn get_total_size(&self) -> Result<u64> {
        let mut guard = self.lock()?;
        Ok(open_tiers(&mut guard)?.disk.total_size())
    }

    /// Number of entries on disk.
    pub fn get_count(&self) -> Result<usize> {
        let mut guard = self.lock()?;
        Ok(open_tiers(&mut guard)?.disk.count())
    }

    // == Stats ==
    /// Snapshot of the counters, with current entry counts filled in.
    pub fn stats(&self) -> Result<CacheStats> {
        let mut guard = self.lock()?;
        let tiers = open_tiers(&mut guard)?;
        let mut stats = tiers.stats.clone();
        stats.set_entry_counts(tiers.memory.count(), tiers.disk.count());
        Ok(stats)
    }

    // == Tier Introspection ==
    /// Number of entries currently held in memory.
    pub fn memory_count(&self) -> Result<usize> {
        let mut guard = self.lock()?;
        Ok(open_tiers(&mut guard)?.memory.count())
    }

    /// Aggregate payload bytes currently held in memory.
    pub fn memory_size(&self) -> Result<u64> {
        let mut guard = self.lock()?;
        Ok(open_tiers(&mut guard)?.memory.total_size())
    }

    /// Raw memory presence check; ignores TTL and does not touch LRU order.
    pub fn memory_contains(&self, key: &str) -> Result<bool> {
        let mut guard = self.lock()?;
        Ok(open_tiers(&mut guard)?.memory.contains(key))
    }

    /// Raw disk presence check; ignores TTL and does not touch access time.
    pub fn disk_contains(&self, key: &str) -> Result<bool> {
        let mut guard = self.lock()?;
        open_tiers(&mut guard)?.disk.contains(key)
    }

    // == Close ==
    /// Releases the store once in-flight operations finish.
    ///
    /// Every later call, including another `close`, fails with
    /// [`CacheError::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        let tiers = guard.take().ok_or(CacheError::Closed)?;
        tiers.disk.close()?;
        info!("tiered cache closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Tiers<S>>>> {
        self.inner
            .lock()
            .map_err(|_| CacheError::Internal("cache lock poisoned".to_string()))
    }
}

fn open_tiers<'a, S: EntryStore>(
    guard: &'a mut MutexGuard<'_, Option<Tiers<S>>>,
) -> Result<&'a mut Tiers<S>> {
    let slot: &'a mut Option<Tiers<S>> = guard;
    slot.as_mut().ok_or(CacheError::Closed)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::path::PathBuf;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
        value: i64,
    }

    impl Cacheable for Item {
        const SCHEMA_VERSION: &'static str = "1.0.0";
    }

    fn config() -> CacheConfig {
        CacheConfig {
            db_path: PathBuf::from(":memory:"),
            max_memory_items: 10,
            max_memory_size_bytes: 1024,
            max_disk_items: 100,
            max_disk_size_bytes: 10240,
            memory_ttl_seconds: 60.0,
            disk_ttl_seconds: 3600.0,
            max_item_size_bytes: 512,
        }
    }

    fn item(name: &str, value: i64) -> Item {
        Item {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_put_then_get() {
        let cache = TieredCache::<Item>::open(config()).unwrap();

        cache.put("key1", &item("test", 42), Some(0.0)).unwrap();
        assert_eq!(cache.get("key1", Some(0.0)).unwrap(), Some(item("test", 42)));
        assert_eq!(cache.get_count().unwrap(), 1);
        assert_eq!(cache.memory_count().unwrap(), 1);
    }

    #[test]
    fn test_get_missing_is_none() {
        let cache = TieredCache::<Item>::open(config()).unwrap();
        assert_eq!(cache.get("nonexistent", None).unwrap(), None);
        assert!(!cache.exists("nonexistent", None).unwrap());
    }

    #[test]
    fn test_wall_clock_default() {
        let cache = TieredCache::<Item>::open(config()).unwrap();

        cache.put("key1", &item("now", 1), None).unwrap();
        assert_eq!(cache.get("key1", None).unwrap(), Some(item("now", 1)));
    }

    #[test]
    fn test_promoted_copy_never_outlives_disk() {
        let cache = TieredCache::<Item>::open(config()).unwrap();

        cache.put("key1", &item("edge", 1), Some(0.0)).unwrap();
        // Past memory TTL, 10s before disk expiry: disk hit, promoted
        assert!(cache.get("key1", Some(3590.0)).unwrap().is_some());
        assert!(cache.memory_contains("key1").unwrap());

        // Past disk expiry the memory copy must not answer
        assert_eq!(cache.get("key1", Some(3601.0)).unwrap(), None);
        assert!(!cache.memory_contains("key1").unwrap());
        assert!(!cache.disk_contains("key1").unwrap());
    }

    #[test]
    fn test_disk_rejection_drops_previous_value() {
        let cache = TieredCache::<Item>::open(CacheConfig {
            max_disk_size_bytes: 64,
            ..config()
        })
        .unwrap();

        cache.put("key1", &item("small", 1), Some(0.0)).unwrap();
        cache
            .put("key1", &item(&"x".repeat(200), 2), Some(1.0))
            .unwrap();

        assert_eq!(cache.get("key1", Some(2.0)).unwrap(), None);
        assert_eq!(cache.stats().unwrap().rejections, 1);
    }

    #[test]
    fn test_stats_track_tier_hits() {
        let cache = TieredCache::<Item>::open(CacheConfig {
            max_memory_items: 1,
            ..config()
        })
        .unwrap();

        cache.put("a", &item("a", 1), Some(0.0)).unwrap();
        cache.put("b", &item("b", 2), Some(1.0)).unwrap();

        cache.get("b", Some(2.0)).unwrap(); // memory
        cache.get("a", Some(3.0)).unwrap(); // disk + promotion
        cache.get("zzz", Some(4.0)).unwrap(); // miss

        let stats = cache.stats().unwrap();
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.disk_hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.promotions, 1);
        assert_eq!(stats.memory_evictions, 2);
        assert_eq!(stats.memory_entries, 1);
        assert_eq!(stats.disk_entries, 2);
    }

    #[test]
    fn test_operations_after_close_fail() {
        let cache = TieredCache::<Item>::open(config()).unwrap();
        cache.put("key1", &item("x", 1), Some(0.0)).unwrap();

        cache.close().unwrap();
        assert!(cache.is_closed());

        assert!(matches!(cache.get("key1", Some(0.0)), Err(CacheError::Closed)));
        assert!(matches!(
            cache.put("key1", &item("x", 1), Some(0.0)),
            Err(CacheError::Closed)
        ));
        assert!(matches!(cache.delete("key1"), Err(CacheError::Closed)));
        assert!(matches!(cache.exists("key1", None), Err(CacheError::Closed)));
        assert!(matches!(cache.clear(), Err(CacheError::Closed)));
        assert!(matches!(cache.get_count(), Err(CacheError::Closed)));
        assert!(matches!(cache.get_total_size(), Err(CacheError::Closed)));
        assert!(matches!(cache.close(), Err(CacheError::Closed)));
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let result = TieredCache::<Item>::open(CacheConfig {
            memory_ttl_seconds: 7200.0,
            ..config()
        });
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }
}
