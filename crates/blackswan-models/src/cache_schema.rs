/// Table backing the SQLite result store.
///
/// Timestamps are Unix milliseconds. `last_access` is a monotonically
/// increasing sequence (not a time) so LRU order is exact even when several
/// reads land in the same millisecond.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS analysis_cache (
///     fingerprint  TEXT PRIMARY KEY,
///     result_json  TEXT NOT NULL,
///     created_at   INTEGER NOT NULL,
///     expires_at   INTEGER NOT NULL,
///     last_access  INTEGER NOT NULL
/// );
/// ```
pub const RESULT_CACHE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS analysis_cache (
    fingerprint  TEXT PRIMARY KEY,
    result_json  TEXT NOT NULL,
    created_at   INTEGER NOT NULL,
    expires_at   INTEGER NOT NULL,
    last_access  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_analysis_cache_expires ON analysis_cache(expires_at);
CREATE INDEX IF NOT EXISTS idx_analysis_cache_access ON analysis_cache(last_access);
";

/// A raw row of the `analysis_cache` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRow {
    pub fingerprint: String,
    pub result_json: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_access: i64,
}
