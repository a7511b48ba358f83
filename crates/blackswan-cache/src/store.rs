use std::time::Duration;

use async_trait::async_trait;
use blackswan_models::{AnalysisResult, Fingerprint};

use crate::error::CacheError;

/// The result cache contract.
///
/// Entries expire `ttl` after insertion regardless of access. When the store
/// is full and a new key is inserted, the entry with the oldest last access is
/// evicted. A `get` on an expired entry reports a miss and removes it.
/// Any backing store substituted underneath the orchestrator must keep these
/// semantics.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get(&self, key: &Fingerprint) -> Result<Option<AnalysisResult>, CacheError>;

    async fn set(
        &self,
        key: &Fingerprint,
        result: &AnalysisResult,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Returns true if an entry was removed.
    async fn delete(&self, key: &Fingerprint) -> Result<bool, CacheError>;

    /// Remove every expired entry. Returns how many were removed.
    async fn cleanup_expired(&self) -> Result<usize, CacheError>;

    /// Number of stored entries, including expired ones not yet swept.
    async fn len(&self) -> Result<usize, CacheError>;
}
