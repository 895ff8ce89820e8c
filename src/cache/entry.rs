//! Cache Entry Module
//!
//! Defines the unit stored in either tier, with TTL and access bookkeeping.

use chrono::Utc;

// == Cache Entry ==
/// A single cached value in serialized form plus its metadata.
///
/// Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Key, unique within a tier
    pub key: String,
    /// Serialized value
    pub payload: Vec<u8>,
    /// Schema tag recorded at write time
    pub schema_version: String,
    /// Byte length of `payload`
    pub size_bytes: u64,
    /// Insertion timestamp
    pub written_at: f64,
    /// Refreshed on every successful read
    pub last_accessed_at: f64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry written (and last accessed) at `now`.
    pub fn new(
        key: impl Into<String>,
        payload: Vec<u8>,
        schema_version: impl Into<String>,
        now: f64,
    ) -> Self {
        let size_bytes = payload.len() as u64;
        Self {
            key: key.into(),
            payload,
            schema_version: schema_version.into(),
            size_bytes,
            written_at: now,
            last_accessed_at: now,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has outlived `ttl_seconds` at `now`.
    ///
    /// An entry is expired once its age is strictly greater than the TTL, so
    /// a read at exactly `written_at + ttl` still hits.
    pub fn is_expired(&self, now: f64, ttl_seconds: f64) -> bool {
        self.age(now) > ttl_seconds
    }

    /// Seconds elapsed since the entry was written.
    pub fn age(&self, now: f64) -> f64 {
        now - self.written_at
    }

}

// == Entry Metadata ==
/// Payload-free view of an entry, as listed by store scans.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMeta {
    pub key: String,
    pub size_bytes: u64,
    pub written_at: f64,
    pub last_accessed_at: f64,
}

impl EntryMeta {
    pub fn is_expired(&self, now: f64, ttl_seconds: f64) -> bool {
        now - self.written_at > ttl_seconds
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in (fractional) seconds.
pub fn current_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
