//! Cache Module
//!
//! Two-tier caching: a bounded in-memory LRU accelerator over a persistent
//! disk tier, with schema-versioned payloads.

mod codec;
mod disk;
mod entry;
mod lru;
mod memory;
mod stats;
mod tiered;


// Re-export public types
pub use codec::{Cacheable, Encoded, SchemaCodec};
pub use disk::DiskTier;
pub use entry::{current_timestamp, CacheEntry, EntryMeta};
pub use lru::LruTracker;
pub use memory::{Insertion, Lookup, MemoryTier};
pub use stats::CacheStats;
pub use tiered::TieredCache;
