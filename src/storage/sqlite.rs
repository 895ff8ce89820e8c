//! SQLite Store
//!
//! `EntryStore` over a single SQLite database with an `entries` table and a
//! one-row `meta` table holding the running totals.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, EntryMeta};
use crate::config::IN_MEMORY_PATH;
use crate::error::Result;
use crate::storage::{BatchOp, EntryStore, StoreTotals, WriteBatch};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS entries (
        key TEXT PRIMARY KEY,
        payload BLOB NOT NULL,
        schema_version TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        written_at REAL NOT NULL,
        last_accessed_at REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_entries_lru
        ON entries (last_accessed_at, written_at);
    CREATE TABLE IF NOT EXISTS meta (
        id INTEGER PRIMARY KEY CHECK (id = 0),
        item_count INTEGER NOT NULL,
        total_size_bytes INTEGER NOT NULL
    );
    INSERT OR IGNORE INTO meta (id, item_count, total_size_bytes) VALUES (0, 0, 0);
";

// == SQLite Store ==
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    // == Open ==
    /// Opens (creating if needed) the database at `path`.
    ///
    /// `:memory:` opens a transient database private to this handle.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = if path.as_os_str() == IN_MEMORY_PATH {
            Connection::open_in_memory()?
        } else {
            let conn = Connection::open(path)?;
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            debug!(path = %path.display(), journal_mode = %mode, "opened sqlite store");
            conn
        };
        conn.execute_batch(SCHEMA)?;

        let mut store = Self { conn };
        store.reconcile_totals()?;
        Ok(store)
    }

    /// Opens a transient in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(IN_MEMORY_PATH)
    }

    // == Reconcile ==
    /// Rebuilds the metadata index from the entries table if they disagree.
    ///
    /// Returns true when a repair was needed.
    pub fn reconcile_totals(&mut self) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let actual: StoreTotals = tx.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM entries",
            [],
            |row| {
                Ok(StoreTotals {
                    item_count: row.get::<_, i64>(0)? as usize,
                    total_size_bytes: row.get::<_, i64>(1)? as u64,
                })
            },
        )?;
        let recorded = read_totals(&tx)?;
        if actual == recorded {
            return Ok(false);
        }

        warn!(
            recorded_items = recorded.item_count,
            actual_items = actual.item_count,
            recorded_bytes = recorded.total_size_bytes,
            actual_bytes = actual.total_size_bytes,
            "sqlite store index out of step with entries, rebuilding"
        );
        tx.execute(
            "UPDATE meta SET item_count = ?1, total_size_bytes = ?2 WHERE id = 0",
            params![actual.item_count as i64, actual.total_size_bytes as i64],
        )?;
        tx.commit()?;
        Ok(true)
    }
}

impl EntryStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT key, payload, schema_version, size_bytes, written_at, last_accessed_at
                 FROM entries WHERE key = ?1",
                params![key],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn meta(&self, key: &str) -> Result<Option<EntryMeta>> {
        let meta = self
            .conn
            .query_row(
                "SELECT key, size_bytes, written_at, last_accessed_at
                 FROM entries WHERE key = ?1",
                params![key],
                meta_from_row,
            )
            .optional()?;
        Ok(meta)
    }

    fn totals(&self) -> Result<StoreTotals> {
        Ok(read_totals(&self.conn)?)
    }

    fn scan_by_access(&self) -> Result<Vec<EntryMeta>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT key, size_bytes, written_at, last_accessed_at FROM entries
             ORDER BY last_accessed_at ASC, written_at ASC, key ASC",
        )?;
        let rows = stmt.query_map([], meta_from_row)?;
        let metas = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(metas)
    }

    fn commit(&mut self, batch: &WriteBatch) -> Result<StoreTotals> {
        let tx = self.conn.transaction()?;
        for op in batch.ops() {
            apply_op(&tx, op)?;
        }
        let totals = read_totals(&tx)?;
        tx.commit()?;
        Ok(totals)
    }

    fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| err)?;
        info!("sqlite store closed");
        Ok(())
    }
}

// == Helpers ==

fn apply_op(tx: &Transaction<'_>, op: &BatchOp) -> rusqlite::Result<()> {
    match op {
        BatchOp::Put(entry) => {
            let previous = previous_size(tx, &entry.key)?;
            tx.execute(
                "INSERT OR REPLACE INTO entries
                 (key, payload, schema_version, size_bytes, written_at, last_accessed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.key,
                    entry.payload,
                    entry.schema_version,
                    entry.size_bytes as i64,
                    entry.written_at,
                    entry.last_accessed_at,
                ],
            )?;
            let (count_delta, size_delta) = match previous {
                Some(old) => (0, entry.size_bytes as i64 - old),
                None => (1, entry.size_bytes as i64),
            };
            adjust_totals(tx, count_delta, size_delta)
        }
        BatchOp::Delete(key) => {
            if let Some(old) = previous_size(tx, key)? {
                tx.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
                adjust_totals(tx, -1, -old)?;
            }
            Ok(())
        }
        BatchOp::Touch { key, accessed_at } => {
            tx.execute(
                "UPDATE entries SET last_accessed_at = ?1 WHERE key = ?2",
                params![accessed_at, key],
            )?;
            Ok(())
        }
        BatchOp::Clear => {
            tx.execute("DELETE FROM entries", [])?;
            tx.execute(
                "UPDATE meta SET item_count = 0, total_size_bytes = 0 WHERE id = 0",
                [],
            )?;
            Ok(())
        }
    }
}

fn previous_size(tx: &Transaction<'_>, key: &str) -> rusqlite::Result<Option<i64>> {
    tx.query_row(
        "SELECT size_bytes FROM entries WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

fn adjust_totals(tx: &Transaction<'_>, count_delta: i64, size_delta: i64) -> rusqlite::Result<()> {
    tx.execute(
        "UPDATE meta SET item_count = item_count + ?1, total_size_bytes = total_size_bytes + ?2
         WHERE id = 0",
        params![count_delta, size_delta],
    )?;
    Ok(())
}

fn read_totals(conn: &Connection) -> rusqlite::Result<StoreTotals> {
    conn.query_row(
        "SELECT item_count, total_size_bytes FROM meta WHERE id = 0",
        [],
        |row| {
            Ok(StoreTotals {
                item_count: row.get::<_, i64>(0)? as usize,
                total_size_bytes: row.get::<_, i64>(1)? as u64,
            })
        },
    )
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        key: row.get(0)?,
        payload: row.get(1)?,
        schema_version: row.get(2)?,
        size_bytes: row.get::<_, i64>(3)? as u64,
        written_at: row.get(4)?,
        last_accessed_at: row.get(5)?,
    })
}

fn meta_from_row(row: &Row<'_>) -> rusqlite::Result<EntryMeta> {
    Ok(EntryMeta {
        key: row.get(0)?,
        size_bytes: row.get::<_, i64>(1)? as u64,
        written_at: row.get(2)?,
        last_accessed_at: row.get(3)?,
    })
}
