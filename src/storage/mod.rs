//! Storage Module
//!
//! The persistent store contract the disk tier is built on, and the SQLite
//! implementation shipped with the crate.
//!
//! A store keeps entries keyed by string plus a metadata index holding the
//! running item count and byte total. Every mutation goes through
//! [`EntryStore::commit`], which applies a [`WriteBatch`] and the matching
//! index update in one all-or-nothing transaction.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::cache::{CacheEntry, EntryMeta};
use crate::error::Result;

// == Store Totals ==
/// Contents of the metadata index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreTotals {
    pub item_count: usize,
    pub total_size_bytes: u64,
}

// == Batch Operations ==
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Insert or replace an entry
    Put(CacheEntry),
    /// Remove an entry if present
    Delete(String),
    /// Refresh `last_accessed_at` of an entry if present
    Touch { key: String, accessed_at: f64 },
    /// Remove every entry
    Clear,
}

/// Ordered list of mutations applied atomically by a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, entry: CacheEntry) -> &mut Self {
        self.ops.push(BatchOp::Put(entry));
        self
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Delete(key.into()));
        self
    }

    pub fn touch(&mut self, key: impl Into<String>, accessed_at: f64) -> &mut Self {
        self.ops.push(BatchOp::Touch {
            key: key.into(),
            accessed_at,
        });
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.ops.push(BatchOp::Clear);
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

}

// == Entry Store ==
/// Transactional key → entry store backing the disk tier.
pub trait EntryStore {
    /// Reads an entry without changing its access time.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Reads an entry's metadata without loading its payload.
    fn meta(&self, key: &str) -> Result<Option<EntryMeta>>;

    /// Current contents of the metadata index.
    fn totals(&self) -> Result<StoreTotals>;

    /// Lists all entries ordered by `last_accessed_at`, then `written_at`.
    fn scan_by_access(&self) -> Result<Vec<EntryMeta>>;

    /// Applies `batch` and the matching index update in one transaction.
    ///
    /// Either every operation takes effect or none does. Returns the index
    /// totals after the commit.
    fn commit(&mut self, batch: &WriteBatch) -> Result<StoreTotals>;

    /// Flushes pending state and releases the underlying handle.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
