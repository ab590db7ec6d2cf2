use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::StoreError;
use crate::types::{AnalysisResult, EntityRef, StoreStats};

use super::ResultStore;
use super::schema;

/// SQLite-backed implementation of `ResultStore`.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        debug!(path = %path.display(), "Result store opened");
        Ok(store)
    }

    /// In-memory store, used when no `[store] path` is configured.
    pub fn in_memory() -> crate::error::Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("result store mutex poisoned".into()))
    }

    fn initialize(&self) -> crate::error::Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(StoreError::Sqlite)?;

        // Ignored for in-memory databases
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");

        conn.execute_batch(schema::SCHEMA_SQL)
            .map_err(StoreError::Sqlite)?;

        conn.execute(
            "INSERT OR IGNORE INTO linguist_meta (key, value) VALUES ('schema_version', ?1)",
            params![schema::SCHEMA_VERSION],
        )
        .map_err(StoreError::Sqlite)?;

        let version: String = conn
            .query_row(
                "SELECT value FROM linguist_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)?;
        if version != schema::SCHEMA_VERSION {
            return Err(StoreError::Migration(format!(
                "database schema version {version} is not supported (expected {})",
                schema::SCHEMA_VERSION
            ))
            .into());
        }

        Ok(())
    }
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

fn decode_result(data: &str, computed_at_ms: i64) -> Result<AnalysisResult, StoreError> {
    let mut result: AnalysisResult = serde_json::from_str(data)?;
    // Rows written before the count was stored deserialize it as zero
    result.language_count = result.stats.len();
    // The column is authoritative for ordering.
    if let Some(ts) = from_millis(computed_at_ms) {
        result.computed_at = ts;
    }
    Ok(result)
}

#[async_trait::async_trait]
impl ResultStore for SqliteStore {
    async fn upsert(&self, result: &AnalysisResult) -> crate::error::Result<bool> {
        let data = serde_json::to_string(result).map_err(StoreError::Serialization)?;
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "INSERT INTO entity_results (entity_ref, computed_at, unreadable_files, data)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(entity_ref) DO UPDATE SET
                    computed_at = excluded.computed_at,
                    unreadable_files = excluded.unreadable_files,
                    data = excluded.data
                 WHERE excluded.computed_at > entity_results.computed_at",
                params![
                    result.entity_ref.as_str(),
                    millis(result.computed_at),
                    result.unreadable_files,
                    data
                ],
            )
            .map_err(StoreError::Sqlite)?;

        if changed == 0 {
            debug!(entity = %result.entity_ref, "Older result discarded");
        }
        Ok(changed > 0)
    }

    async fn read(&self, entity_ref: &EntityRef) -> crate::error::Result<Option<AnalysisResult>> {
        let conn = self.lock()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT data, computed_at FROM entity_results WHERE entity_ref = ?1",
                params![entity_ref.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        drop(conn);

        match row {
            Some((data, computed_at)) => Ok(Some(decode_result(&data, computed_at)?)),
            None => Ok(None),
        }
    }

    async fn read_all(&self) -> crate::error::Result<Vec<AnalysisResult>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT data, computed_at FROM entity_results ORDER BY entity_ref")
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;

        let results = rows
            .iter()
            .map(|(data, computed_at)| decode_result(data, *computed_at))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    async fn delete(&self, entity_ref: &EntityRef) -> crate::error::Result<bool> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM entity_results WHERE entity_ref = ?1",
                params![entity_ref.as_str()],
            )
            .map_err(StoreError::Sqlite)?;
        Ok(removed > 0)
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> crate::error::Result<bool> {
        let now_ms = millis(now);
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_ms.saturating_add(ttl_ms);

        let conn = self.lock()?;
        let changed = conn
            .execute(
                "INSERT INTO leases (name, holder, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    holder = excluded.holder,
                    expires_at = excluded.expires_at
                 WHERE leases.expires_at <= ?4 OR leases.holder = excluded.holder",
                params![name, holder, expires_at, now_ms],
            )
            .map_err(StoreError::Sqlite)?;
        Ok(changed > 0)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> crate::error::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM leases WHERE name = ?1 AND holder = ?2",
            params![name, holder],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn lease_holder(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> crate::error::Result<Option<String>> {
        let conn = self.lock()?;
        let holder = conn
            .query_row(
                "SELECT holder FROM leases WHERE name = ?1 AND expires_at > ?2",
                params![name, millis(now)],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        Ok(holder)
    }

    async fn stats(&self) -> crate::error::Result<StoreStats> {
        let conn = self.lock()?;

        let (total_results, partial_results, oldest, newest): (u64, u64, Option<i64>, Option<i64>) =
            conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN unreadable_files > 0 THEN 1 ELSE 0 END), 0),
                        MIN(computed_at),
                        MAX(computed_at)
                 FROM entity_results",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(StoreError::Sqlite)?;

        let db_size_bytes: u64 = conn
            .query_row(
                "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)?;

        Ok(StoreStats {
            total_results,
            partial_results,
            oldest_computed_at: oldest.and_then(from_millis),
            newest_computed_at: newest.and_then(from_millis),
            db_size_bytes,
        })
    }
}
