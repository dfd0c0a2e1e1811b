//! Storage interfaces the rollup engine consumes.
//!
//! The in-memory backend here backs tests and embedded use. Deployments
//! with real persistence implement the same two traits and hand them to
//! the engine unchanged.

use async_trait::async_trait;
use chrono::NaiveDate;

use pagepulse_core::{DailySnapshot, RawEvent};

pub mod memory;

pub use memory::MemoryStore;

/// Append-only store of raw visit events.
///
/// Both read methods are full scans by design — the engine filters in
/// memory and assumes no server-side filtering beyond by-site.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    async fn insert_events(&self, events: &[RawEvent]) -> anyhow::Result<()>;

    async fn find_by_site(&self, site_id: &str) -> anyhow::Result<Vec<RawEvent>>;

    async fn find_all(&self) -> anyhow::Result<Vec<RawEvent>>;
}

/// Write-once store of daily snapshots.
///
/// Implementations must reject a second save for the same
/// `(site_id, date)` pair — snapshots are immutable once written.
#[async_trait]
pub trait SnapshotStore: Send + Sync + 'static {
    /// All snapshots for `site_id` with `start <= date <= end`, ordered by
    /// date ascending.
    async fn find_by_range(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<DailySnapshot>>;

    async fn find_one(
        &self,
        site_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<Option<DailySnapshot>>;

    async fn save(&self, snapshot: &DailySnapshot) -> anyhow::Result<()>;
}
