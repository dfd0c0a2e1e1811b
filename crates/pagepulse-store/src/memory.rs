//! In-memory backend for both store traits.

use std::collections::HashMap;

use anyhow::bail;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use pagepulse_core::{DailySnapshot, RawEvent};

use crate::{EventStore, SnapshotStore};

/// In-memory event and snapshot store.
///
/// One `RwLock` per collection; readers clone out so locks are never held
/// across computation.
#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<Vec<RawEvent>>,
    snapshots: RwLock<HashMap<(String, NaiveDate), DailySnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots. Useful in idempotence tests.
    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_events(&self, events: &[RawEvent]) -> anyhow::Result<()> {
        self.events.write().await.extend_from_slice(events);
        Ok(())
    }

    async fn find_by_site(&self, site_id: &str) -> anyhow::Result<Vec<RawEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> anyhow::Result<Vec<RawEvent>> {
        Ok(self.events.read().await.clone())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn find_by_range(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<DailySnapshot>> {
        let mut rows: Vec<DailySnapshot> = self
            .snapshots
            .read()
            .await
            .values()
            .filter(|s| s.site_id == site_id && s.date >= start && s.date <= end)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.date);
        Ok(rows)
    }

    async fn find_one(
        &self,
        site_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<Option<DailySnapshot>> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(&(site_id.to_string(), date))
            .cloned())
    }

    async fn save(&self, snapshot: &DailySnapshot) -> anyhow::Result<()> {
        let key = (snapshot.site_id.clone(), snapshot.date);
        let mut snapshots = self.snapshots.write().await;
        if snapshots.contains_key(&key) {
            bail!(
                "snapshot already exists for site {} on {}",
                snapshot.site_id,
                snapshot.date
            );
        }
        snapshots.insert(key, snapshot.clone());
        Ok(())
    }
}
