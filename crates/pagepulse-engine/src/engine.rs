//! The query facade the transport layer talks to.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

use pagepulse_core::combine::{combine_site_metrics, CombinedMetrics};
use pagepulse_core::config::{Config, SiteInfo};
use pagepulse_core::metrics::{compute_range_metrics, RangeMetrics};
use pagepulse_core::snapshot::{rollup_snapshots, RollupSummary};
use pagepulse_core::{DailySnapshot, RangeToken};
use pagepulse_store::{EventStore, SnapshotStore};

use crate::aggregation::{self, AggregationReport};

/// Stateless facade over the event and snapshot stores.
///
/// Every query re-reads from the stores and computes fresh — no caching,
/// no shared mutable state between calls. Cloning is cheap (all fields are
/// `Arc`s), which is what the combiner relies on to fan work out.
#[derive(Clone)]
pub struct AnalyticsEngine {
    events: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    config: Arc<Config>,
}

impl AnalyticsEngine {
    pub fn new(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        config: Config,
    ) -> Self {
        Self {
            events,
            snapshots,
            config: Arc::new(config),
        }
    }

    pub fn roster(&self) -> &[SiteInfo] {
        &self.config.sites
    }

    /// On-demand per-site metrics over raw events.
    ///
    /// Validates the range token first and fails fast on anything
    /// unrecognized — there is no silent default range.
    pub async fn get_range_metrics(
        &self,
        site_id: &str,
        range: &str,
    ) -> anyhow::Result<RangeMetrics> {
        let token = RangeToken::parse(range)?;
        self.range_metrics_for(site_id, token, Utc::now().date_naive())
            .await
    }

    pub(crate) async fn range_metrics_for(
        &self,
        site_id: &str,
        token: RangeToken,
        today: NaiveDate,
    ) -> anyhow::Result<RangeMetrics> {
        let all_events = self.events.find_by_site(site_id).await?;
        Ok(compute_range_metrics(site_id, token, &all_events, today))
    }

    /// Range summary answered from pre-computed snapshots, without touching
    /// raw events.
    pub async fn get_snapshot_rollup(
        &self,
        site_id: &str,
        range: &str,
    ) -> anyhow::Result<RollupSummary> {
        let token = RangeToken::parse(range)?;
        let interval = token.resolve(Utc::now().date_naive());
        let snapshots = self
            .snapshots
            .find_by_range(site_id, interval.start, interval.end)
            .await?;
        Ok(rollup_snapshots(site_id, token, &snapshots))
    }

    /// Raw snapshots in range, date-ascending. Dashboard passthrough.
    pub async fn list_snapshots(
        &self,
        site_id: &str,
        range: &str,
    ) -> anyhow::Result<Vec<DailySnapshot>> {
        let token = RangeToken::parse(range)?;
        let interval = token.resolve(Utc::now().date_naive());
        self.snapshots
            .find_by_range(site_id, interval.start, interval.end)
            .await
    }

    /// Portfolio-wide metrics across the configured roster.
    ///
    /// Per-site computations run as independent tasks, bounded by
    /// `combine_concurrency`. A site whose fetch fails is logged and
    /// omitted from the merge; the remaining sites still combine.
    pub async fn get_combined_metrics(&self, range: &str) -> anyhow::Result<CombinedMetrics> {
        let token = RangeToken::parse(range)?;
        let today = Utc::now().date_naive();

        let limit = Arc::new(Semaphore::new(self.config.combine_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for (position, site) in self.config.sites.iter().cloned().enumerate() {
            let engine = self.clone();
            let limit = Arc::clone(&limit);
            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition only fails
                // if the runtime is shutting down anyway.
                let _permit = limit.acquire_owned().await.ok();
                let result = engine.range_metrics_for(&site.site_id, token, today).await;
                (position, site, result)
            });
        }

        let mut per_site: Vec<(usize, SiteInfo, RangeMetrics)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, site, Ok(metrics))) => per_site.push((position, site, metrics)),
                Ok((_, site, Err(err))) => {
                    warn!(
                        site_id = %site.site_id,
                        error = %err,
                        "per-site fetch failed, omitting site from combined metrics"
                    );
                }
                Err(err) => {
                    error!(error = %err, "combiner task panicked");
                }
            }
        }
        // Join order is completion order; restore roster order for output.
        per_site.sort_by_key(|(position, _, _)| *position);

        let rows: Vec<(SiteInfo, RangeMetrics)> = per_site
            .into_iter()
            .map(|(_, site, metrics)| (site, metrics))
            .collect();
        Ok(combine_site_metrics(token, &rows))
    }

    /// Run the idempotent daily aggregation job once.
    pub async fn run_daily_aggregation(&self) -> anyhow::Result<AggregationReport> {
        aggregation::aggregate_daily(self.events.as_ref(), self.snapshots.as_ref()).await
    }
}
