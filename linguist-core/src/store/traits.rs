use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{AnalysisResult, EntityRef, StoreStats};

/// Durable map from entity reference to its latest analysis result.
///
/// Every operation is atomic: a reader observes either the previous or the
/// new result for an entity, never a mix. Writers race under
/// last-writer-wins on `computed_at`.
#[async_trait::async_trait]
pub trait ResultStore: Send + Sync + std::fmt::Debug {
    // ── Results ────────────────────────────────────────────────────

    /// Store a result unless a strictly newer one is already present.
    /// Returns whether the write took effect.
    async fn upsert(&self, result: &AnalysisResult) -> crate::error::Result<bool>;

    /// The current result for an entity, if any.
    async fn read(&self, entity_ref: &EntityRef) -> crate::error::Result<Option<AnalysisResult>>;

    /// All stored results, ordered by entity reference.
    async fn read_all(&self) -> crate::error::Result<Vec<AnalysisResult>>;

    /// Remove an entity's result. Returns whether anything was removed.
    async fn delete(&self, entity_ref: &EntityRef) -> crate::error::Result<bool>;

    // ── Leases ─────────────────────────────────────────────────────

    /// Take the named lease for `ttl` if it is free, expired, or already
    /// held by `holder`.
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> crate::error::Result<bool>;

    /// Give up the named lease if `holder` still owns it.
    async fn release_lease(&self, name: &str, holder: &str) -> crate::error::Result<()>;

    /// Current holder of the named lease, unless it is free or expired.
    async fn lease_holder(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> crate::error::Result<Option<String>>;

    // ── Metadata ───────────────────────────────────────────────────

    async fn stats(&self) -> crate::error::Result<StoreStats>;
}
