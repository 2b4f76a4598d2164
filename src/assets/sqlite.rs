//! SQLite-backed asset table (feature `sqlite`).

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::{
    SqliteConnectionManager,
    rusqlite::{OpenFlags, OptionalExtension as _, Row, params},
};

use crate::{
    assets::store::{AssetEntry, AssetStore},
    foundation::error::{BookError, BookResult},
};

pub struct SqliteAssetStore {
    pool: Pool<SqliteConnectionManager>,
}

fn store_err(e: impl std::fmt::Display) -> BookError {
    BookError::store(e.to_string())
}

impl SqliteAssetStore {
    pub fn open(path: &Path) -> BookResult<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
            .with_init(|c| {
                c.busy_timeout(std::time::Duration::from_millis(500))?;
                c.pragma_update(None, "journal_mode", "WAL")?;
                c.execute_batch(
                    "CREATE TABLE IF NOT EXISTS assets (
                        remote_url TEXT PRIMARY KEY NOT NULL,
                        local_uuid TEXT NOT NULL UNIQUE,
                        prefix TEXT NOT NULL,
                        last_accessed INTEGER NOT NULL,
                        size_bytes INTEGER NOT NULL DEFAULT 0,
                        loaded INTEGER NOT NULL DEFAULT 0
                    );
                    CREATE INDEX IF NOT EXISTS assets_last_accessed ON assets(last_accessed);",
                )?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(std::time::Duration::from_secs(5))
            .build(manager)
            .map_err(store_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> BookResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(store_err)
    }
}

fn row_entry(row: &Row<'_>) -> r2d2_sqlite::rusqlite::Result<AssetEntry> {
    Ok(AssetEntry {
        remote_url: row.get(0)?,
        local_uuid: row.get(1)?,
        prefix: row.get(2)?,
        last_accessed: row.get::<_, i64>(3)?.max(0) as u64,
        size_bytes: row.get::<_, i64>(4)?.max(0) as u64,
        loaded: row.get(5)?,
    })
}

const COLUMNS: &str = "remote_url, local_uuid, prefix, last_accessed, size_bytes, loaded";

impl AssetStore for SqliteAssetStore {
    fn get(&self, url: &str) -> BookResult<Option<AssetEntry>> {
        self.conn()?
            .query_row(
                &format!("SELECT {COLUMNS} FROM assets WHERE remote_url = ?1"),
                params![url],
                row_entry,
            )
            .optional()
            .map_err(store_err)
    }

    fn put(&self, entry: &AssetEntry) -> BookResult<()> {
        self.conn()?
            .execute(
                "INSERT INTO assets(remote_url, local_uuid, prefix, last_accessed, size_bytes, loaded)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(remote_url) DO UPDATE SET
                    local_uuid = excluded.local_uuid,
                    prefix = excluded.prefix,
                    last_accessed = excluded.last_accessed,
                    size_bytes = excluded.size_bytes,
                    loaded = excluded.loaded",
                params![
                    entry.remote_url,
                    entry.local_uuid,
                    entry.prefix,
                    entry.last_accessed as i64,
                    entry.size_bytes as i64,
                    entry.loaded
                ],
            )
            .map_err(store_err)?;
        Ok(())
    }

    fn remove(&self, url: &str) -> BookResult<()> {
        self.conn()?
            .execute("DELETE FROM assets WHERE remote_url = ?1", params![url])
            .map_err(store_err)?;
        Ok(())
    }

    fn len(&self) -> BookResult<usize> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))
            .map_err(store_err)?;
        Ok(n.max(0) as usize)
    }

    fn oldest(&self, n: usize) -> BookResult<Vec<AssetEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM assets ORDER BY last_accessed ASC, remote_url ASC LIMIT ?1"
            ))
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![n as i64], row_entry)
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    fn clear(&self) -> BookResult<Vec<AssetEntry>> {
        let all = self.oldest(usize::MAX >> 1)?;
        self.conn()?
            .execute("DELETE FROM assets", [])
            .map_err(store_err)?;
        Ok(all)
    }

    fn total_bytes(&self) -> BookResult<u64> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COALESCE(SUM(size_bytes), 0) FROM assets", [], |row| {
                row.get(0)
            })
            .map_err(store_err)?;
        Ok(n.max(0) as u64)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/sqlite.rs"]
mod tests;
