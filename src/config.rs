//! Configuration Module
//!
//! Construction parameters for a tiered cache, plus loading them from
//! environment variables for the maintenance binary.

use std::env;
use std::path::PathBuf;

use crate::error::{CacheError, Result};

/// Path understood by the SQLite store as "transient, in-process database".
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Tiered cache configuration parameters.
///
/// Every field is required; the library never invents a ceiling or TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Location of the persistent store (`:memory:` for a transient one)
    pub db_path: PathBuf,
    /// Maximum number of entries held in memory
    pub max_memory_items: usize,
    /// Maximum aggregate payload bytes held in memory
    pub max_memory_size_bytes: u64,
    /// Maximum number of entries held on disk
    pub max_disk_items: usize,
    /// Maximum aggregate payload bytes held on disk
    pub max_disk_size_bytes: u64,
    /// Memory tier TTL in seconds, measured from write time
    pub memory_ttl_seconds: f64,
    /// Disk tier TTL in seconds, measured from write time
    pub disk_ttl_seconds: f64,
    /// Items with a larger payload are written disk-only
    pub max_item_size_bytes: u64,
}

impl CacheConfig {
    /// Checks the cross-field rules the tiers rely on.
    pub fn validate(&self) -> Result<()> {
        if self.memory_ttl_seconds.is_nan() || self.memory_ttl_seconds <= 0.0 {
            return Err(CacheError::InvalidConfig(format!(
                "memory_ttl_seconds must be positive, got {}",
                self.memory_ttl_seconds
            )));
        }
        if self.disk_ttl_seconds.is_nan() || self.disk_ttl_seconds <= 0.0 {
            return Err(CacheError::InvalidConfig(format!(
                "disk_ttl_seconds must be positive, got {}",
                self.disk_ttl_seconds
            )));
        }
        if self.disk_ttl_seconds < self.memory_ttl_seconds {
            return Err(CacheError::InvalidConfig(format!(
                "disk_ttl_seconds ({}) must be >= memory_ttl_seconds ({})",
                self.disk_ttl_seconds, self.memory_ttl_seconds
            )));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(CacheError::InvalidConfig("db_path is empty".to_string()));
        }
        Ok(())
    }

    /// Creates a CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DB_PATH` - Store location (default: `cache.db`)
    /// - `CACHE_MAX_MEMORY_ITEMS` - Memory item ceiling (default: 1000)
    /// - `CACHE_MAX_MEMORY_SIZE_BYTES` - Memory byte ceiling (default: 16 MiB)
    /// - `CACHE_MAX_DISK_ITEMS` - Disk item ceiling (default: 100000)
    /// - `CACHE_MAX_DISK_SIZE_BYTES` - Disk byte ceiling (default: 1 GiB)
    /// - `CACHE_MEMORY_TTL_SECONDS` - Memory TTL (default: 60)
    /// - `CACHE_DISK_TTL_SECONDS` - Disk TTL (default: 3600)
    /// - `CACHE_MAX_ITEM_SIZE_BYTES` - Disk-only threshold (default: 1 MiB)
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("CACHE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("cache.db")),
            max_memory_items: env_or("CACHE_MAX_MEMORY_ITEMS", 1000),
            max_memory_size_bytes: env_or("CACHE_MAX_MEMORY_SIZE_BYTES", 16 * 1024 * 1024),
            max_disk_items: env_or("CACHE_MAX_DISK_ITEMS", 100_000),
            max_disk_size_bytes: env_or("CACHE_MAX_DISK_SIZE_BYTES", 1024 * 1024 * 1024),
            memory_ttl_seconds: env_or("CACHE_MEMORY_TTL_SECONDS", 60.0),
            disk_ttl_seconds: env_or("CACHE_DISK_TTL_SECONDS", 3600.0),
            max_item_size_bytes: env_or("CACHE_MAX_ITEM_SIZE_BYTES", 1024 * 1024),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}
