//! Disk Cache - a two-tier object cache
//!
//! A bounded in-memory LRU tier in front of a persistent SQLite tier, each
//! with its own item, byte and TTL ceilings, storing schema-versioned values.

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;

pub use cache::{CacheStats, Cacheable, TieredCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use storage::{EntryStore, SqliteStore};
