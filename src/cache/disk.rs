//! Disk Tier Module
//!
//! Persistent tier over an [`EntryStore`]. It is the source of truth: an
//! entry evicted here is gone for good, so expired entries are always given
//! up before live ones.

use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, EntryMeta, Insertion, Lookup};
use crate::error::Result;
use crate::storage::{EntryStore, StoreTotals, WriteBatch};

// == Disk Tier ==
#[derive(Debug)]
pub struct DiskTier<S: EntryStore> {
    store: S,
    /// Mirror of the store's metadata index as of the last commit
    totals: StoreTotals,
    max_items: usize,
    max_size_bytes: u64,
    ttl_seconds: f64,
}

impl<S: EntryStore> DiskTier<S> {
    // == Constructor ==
    /// Wraps an opened store, loading its current totals.
    pub fn open(store: S, max_items: usize, max_size_bytes: u64, ttl_seconds: f64) -> Result<Self> {
        let totals = store.totals()?;
        info!(
            items = totals.item_count,
            size_bytes = totals.total_size_bytes,
            max_items,
            max_size_bytes,
            "disk tier opened"
        );
        Ok(Self {
            store,
            totals,
            max_items,
            max_size_bytes,
            ttl_seconds,
        })
    }

    // == Get ==
    /// Looks up `key` at time `now`.
    ///
    /// A hit persists the refreshed `last_accessed_at`. An expired entry is
    /// deleted in its own transaction and reported as `Expired`.
    pub fn get(&mut self, key: &str, now: f64) -> Result<Lookup> {
        let Some(mut entry) = self.store.get(key)? else {
            return Ok(Lookup::Miss);
        };

        let mut batch = WriteBatch::new();
        if entry.is_expired(now, self.ttl_seconds) {
            debug!(key, age = entry.age(now), "disk entry expired");
            batch.delete(key);
            self.commit(&batch)?;
            return Ok(Lookup::Expired);
        }

        batch.touch(key, now);
        self.commit(&batch)?;
        entry.last_accessed_at = now;
        Ok(Lookup::Hit(entry))
    }

    // == Touch ==
    /// Persists a read served elsewhere as an access at `now`, without
    /// loading the payload. Missing keys are ignored.
    pub fn touch(&mut self, key: &str, now: f64) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.touch(key, now);
        self.commit(&batch)
    }

    // == Put ==
    /// Inserts or replaces an entry, evicting in the same transaction.
    ///
    /// Victims are chosen among the other entries: expired ones first, then
    /// live ones in LRU order, until both ceilings hold. An entry too large
    /// for an empty tier is refused and any stale copy under its key is
    /// deleted instead.
    pub fn put(&mut self, entry: CacheEntry) -> Result<Insertion> {
        let mut batch = WriteBatch::new();

        if self.max_items == 0 || entry.size_bytes > self.max_size_bytes {
            warn!(
                key = %entry.key,
                size_bytes = entry.size_bytes,
                max_size_bytes = self.max_size_bytes,
                "disk tier refused oversized entry"
            );
            batch.delete(entry.key);
            self.commit(&batch)?;
            return Ok(Insertion::rejected());
        }

        let now = entry.written_at;
        let previous = self.store.meta(&entry.key)?;
        let mut count = self.totals.item_count + usize::from(previous.is_none());
        let mut size = self.totals.total_size_bytes + entry.size_bytes
            - previous.as_ref().map_or(0, |m| m.size_bytes);

        let mut insertion = Insertion {
            inserted: true,
            ..Insertion::default()
        };

        if count > self.max_items || size > self.max_size_bytes {
            let (expired, live): (Vec<EntryMeta>, Vec<EntryMeta>) = self
                .store
                .scan_by_access()?
                .into_iter()
                .filter(|m| m.key != entry.key)
                .partition(|m| m.is_expired(now, self.ttl_seconds));

            for (victim, is_expired) in expired
                .into_iter()
                .map(|m| (m, true))
                .chain(live.into_iter().map(|m| (m, false)))
            {
                if count <= self.max_items && size <= self.max_size_bytes {
                    break;
                }
                count -= 1;
                size -= victim.size_bytes;
                batch.delete(victim.key.as_str());
                if is_expired {
                    insertion.expired.push(victim.key);
                } else {
                    insertion.evicted.push(victim.key);
                }
            }
        }

        batch.put(entry);
        self.commit(&batch)?;

        if !insertion.evicted.is_empty() {
            debug!(count = insertion.evicted.len(), "disk tier evicted live entries");
        }
        if !insertion.expired.is_empty() {
            debug!(count = insertion.expired.len(), "disk tier swept expired entries");
        }
        Ok(insertion)
    }

    // == Delete ==
    /// Removes `key` if present.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.commit(&batch)
    }

    // == Clear ==
    pub fn clear(&mut self) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.clear();
        self.commit(&batch)
    }

    // == Purge Expired ==
    /// Deletes every expired entry in one transaction, returning their keys.
    pub fn purge_expired(&mut self, now: f64) -> Result<Vec<String>> {
        let expired: Vec<String> = self
            .store
            .scan_by_access()?
            .into_iter()
            .filter(|m| m.is_expired(now, self.ttl_seconds))
            .map(|m| m.key)
            .collect();

        if !expired.is_empty() {
            let mut batch = WriteBatch::new();
            for key in &expired {
                batch.delete(key.as_str());
            }
            self.commit(&batch)?;
            info!(count = expired.len(), "disk tier purged expired entries");
        }
        Ok(expired)
    }

    /// Raw presence check that ignores TTL and leaves the access time alone.
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.store.meta(key)?.is_some())
    }

    pub fn count(&self) -> usize {
        self.totals.item_count
    }

    pub fn total_size(&self) -> u64 {
        self.totals.total_size_bytes
    }

    pub fn ttl_seconds(&self) -> f64 {
        self.ttl_seconds
    }

    // == Close ==
    /// Releases the underlying store handle.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    fn commit(&mut self, batch: &WriteBatch) -> Result<()> {
        self.totals = self.store.commit(batch)?;
        Ok(())
    }
}
