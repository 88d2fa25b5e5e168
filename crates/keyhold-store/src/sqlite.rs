// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use keyhold_core::{KvRecord, KvStore, StoreError};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS kv (
    project TEXT NOT NULL DEFAULT '',
    key TEXT NOT NULL,
    val TEXT NOT NULL,
    set_by TEXT,
    UNIQUE (project, key)
);";

const BUSY_TIMEOUT_MS: u32 = 5_000;

fn store_err(e: rusqlite::Error) -> StoreError {
    StoreError(e.to_string())
}

/// SQLite-backed store. One connection, serialized behind a mutex.
///
/// Databases created with `STRING` column types give the columns NUMERIC
/// affinity, so numeric-looking text comes back as INTEGER or REAL. Reads cast
/// every column to TEXT.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(store_err)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout={BUSY_TIMEOUT_MS};"
        ))
        .map_err(store_err)?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "kv store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory().map_err(store_err)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL).map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError("sqlite connection lock poisoned".to_string()))
    }

    pub fn get_record(&self, project: &str, key: &str) -> Result<Option<KvRecord>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COALESCE(CAST(project AS TEXT), ''), CAST(key AS TEXT), CAST(val AS TEXT),
                    COALESCE(CAST(set_by AS TEXT), '')
             FROM kv WHERE project = ?1 AND key = ?2",
            params![project, key],
            |row| {
                Ok(KvRecord {
                    project: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                    last_set_by: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(store_err)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))
            .map_err(store_err)?;
        usize::try_from(n).map_err(|e| StoreError(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, project: &str, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT CAST(val AS TEXT) FROM kv WHERE project = ?1 AND key = ?2",
            params![project, key],
            |row| row.get(0),
        )
        .optional()
        .map_err(store_err)
    }

    fn upsert(&self, record: &KvRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv (project, key, val, set_by) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (project, key) DO UPDATE SET val = excluded.val, set_by = excluded.set_by",
            params![record.project, record.key, record.value, record.last_set_by],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn delete(&self, project: &str, key: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM kv WHERE project = ?1 AND key = ?2",
            params![project, key],
        )
        .map_err(store_err)?;
        Ok(())
    }
}
