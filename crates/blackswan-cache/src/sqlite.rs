use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use blackswan_models::cache_schema::{CacheRow, RESULT_CACHE_DDL};
use blackswan_models::{AnalysisResult, Fingerprint};
use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::error::CacheError;
use crate::store::ResultStore;

/// SQLite-backed result store, shareable between processes.
///
/// Implements the same TTL + LRU contract as [`crate::MemoryResultCache`].
/// Expiry uses wall-clock milliseconds; recency uses a sequence number that
/// is bumped inside the same transaction as every read or write.
///
/// `rusqlite::Connection` is not `Sync`, so access is serialized via `Mutex`.
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
    capacity: usize,
}

impl SqliteResultStore {
    /// Open (or create) the cache database in WAL mode.
    pub fn open(path: &str, capacity: usize) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(RESULT_CACHE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self::with_connection(conn, capacity))
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_in_memory(capacity: usize) -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(RESULT_CACHE_DDL)?;
        Ok(Self::with_connection(conn, capacity))
    }

    fn with_connection(conn: Connection, capacity: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|e| CacheError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    /// Fetch the raw row for a key, expired or not.
    pub fn get_row(&self, key: &Fingerprint) -> Result<Option<CacheRow>, CacheError> {
        let conn = self.lock()?;
        select_row(&conn, key)
    }
}

fn select_row(conn: &Connection, key: &Fingerprint) -> Result<Option<CacheRow>, CacheError> {
    let mut stmt = conn.prepare_cached(
        "SELECT fingerprint, result_json, created_at, expires_at, last_access \
         FROM analysis_cache WHERE fingerprint = ?1",
    )?;

    let result = stmt.query_row(rusqlite::params![key.as_str()], |row| {
        Ok(CacheRow {
            fingerprint: row.get(0)?,
            result_json: row.get(1)?,
            created_at: row.get(2)?,
            expires_at: row.get(3)?,
            last_access: row.get(4)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(CacheError::Sqlite(e)),
    }
}

fn next_access_seq(tx: &Transaction<'_>) -> Result<i64, CacheError> {
    let seq: i64 = tx.query_row(
        "SELECT COALESCE(MAX(last_access), 0) + 1 FROM analysis_cache",
        [],
        |row| row.get(0),
    )?;
    Ok(seq)
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn get(&self, key: &Fingerprint) -> Result<Option<AnalysisResult>, CacheError> {
        let mut conn = self.lock()?;
        let now = Utc::now().timestamp_millis();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(row) = select_row(&tx, key)? else {
            return Ok(None);
        };

        if row.expires_at <= now {
            tx.execute(
                "DELETE FROM analysis_cache WHERE fingerprint = ?1",
                rusqlite::params![key.as_str()],
            )?;
            tx.commit()?;
            debug!(fingerprint = %key.short(), "Dropped expired cache row on read");
            return Ok(None);
        }

        let seq = next_access_seq(&tx)?;
        tx.execute(
            "UPDATE analysis_cache SET last_access = ?1 WHERE fingerprint = ?2",
            rusqlite::params![seq, key.as_str()],
        )?;
        tx.commit()?;

        Ok(Some(serde_json::from_str(&row.result_json)?))
    }

    async fn set(
        &self,
        key: &Fingerprint,
        result: &AnalysisResult,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let result_json = serde_json::to_string(result)?;
        let mut conn = self.lock()?;
        let now = Utc::now().timestamp_millis();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM analysis_cache WHERE fingerprint = ?1)",
            rusqlite::params![key.as_str()],
            |row| row.get(0),
        )?;
        if !exists {
            let count: i64 =
                tx.query_row("SELECT COUNT(*) FROM analysis_cache", [], |row| row.get(0))?;
            if count as usize >= self.capacity {
                let evicted = tx.execute(
                    "DELETE FROM analysis_cache WHERE fingerprint = \
                     (SELECT fingerprint FROM analysis_cache ORDER BY last_access ASC LIMIT 1)",
                    [],
                )?;
                debug!(evicted, "Evicted least recently used cache row");
            }
        }

        let seq = next_access_seq(&tx)?;
        tx.execute(
            "INSERT OR REPLACE INTO analysis_cache \
             (fingerprint, result_json, created_at, expires_at, last_access) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                key.as_str(),
                result_json,
                now,
                now.saturating_add(ttl_millis(ttl)),
                seq,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn delete(&self, key: &Fingerprint) -> Result<bool, CacheError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM analysis_cache WHERE fingerprint = ?1",
            rusqlite::params![key.as_str()],
        )?;
        Ok(deleted > 0)
    }

    async fn cleanup_expired(&self) -> Result<usize, CacheError> {
        let conn = self.lock()?;
        let now = Utc::now().timestamp_millis();
        let deleted = conn.execute(
            "DELETE FROM analysis_cache WHERE expires_at <= ?1",
            rusqlite::params![now],
        )?;
        Ok(deleted)
    }

    async fn len(&self) -> Result<usize, CacheError> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM analysis_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
