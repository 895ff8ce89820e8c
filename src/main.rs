//! Disk Cache - maintenance tool
//!
//! Inspects and maintains the persistent tier of a cache database.
//!
//! # Usage
//! ```text
//! disk_cache [stats|purge|clear]
//! ```
//! The database and ceilings come from `CACHE_*` environment variables
//! (see `CacheConfig::from_env`).

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use disk_cache::cache::{current_timestamp, DiskTier};
use disk_cache::{CacheConfig, SqliteStore};

fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "disk_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "stats".to_string());

    let config = CacheConfig::from_env();
    config.validate().context("invalid cache configuration")?;
    info!(
        "Configuration loaded: db_path={}, max_disk_items={}, max_disk_size_bytes={}, disk_ttl={}s",
        config.db_path.display(),
        config.max_disk_items,
        config.max_disk_size_bytes,
        config.disk_ttl_seconds
    );

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    let mut disk = DiskTier::open(
        store,
        config.max_disk_items,
        config.max_disk_size_bytes,
        config.disk_ttl_seconds,
    )?;

    match command.as_str() {
        "stats" => {}
        "purge" => {
            let purged = disk.purge_expired(current_timestamp())?;
            println!("purged {} expired entries", purged.len());
        }
        "clear" => {
            disk.clear()?;
            println!("cleared");
        }
        other => bail!("unknown command `{}` (expected stats, purge or clear)", other),
    }

    println!("entries: {}", disk.count());
    println!("total_size_bytes: {}", disk.total_size());

    disk.close()?;
    Ok(())
}
