//! The daily aggregation job.
//!
//! Reads the full raw-event set, groups by `(site, calendar day)`, and
//! writes one snapshot per group that does not already have one. Safe to
//! re-run: existing snapshots are skipped, never overwritten or merged, so
//! a re-run after a partial failure only reprocesses the missing groups.
//!
//! The job assumes at most one run executes at a time; mutual exclusion is
//! the caller's responsibility (scheduler lock, single process, ...).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, info};

use pagepulse_core::snapshot::build_daily_snapshot;
use pagepulse_core::RawEvent;
use pagepulse_store::{EventStore, SnapshotStore};

/// One `(site, day)` group the job could not persist.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationFailure {
    pub site_id: String,
    pub date: NaiveDate,
    pub error: String,
}

/// Outcome of one aggregation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregationReport {
    pub snapshots_created: usize,
    /// Groups that failed. Successful groups remain durably written even
    /// when this is non-empty — the run is never rolled back.
    pub failures: Vec<AggregationFailure>,
}

impl AggregationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run the aggregation once over everything in the event store.
///
/// Only a failure to scan the event store itself is fatal; per-group store
/// errors are collected into the report and the remaining groups still
/// process.
pub async fn aggregate_daily(
    events: &dyn EventStore,
    snapshots: &dyn SnapshotStore,
) -> anyhow::Result<AggregationReport> {
    let all_events = events.find_all().await?;
    info!(events = all_events.len(), "starting daily aggregation");

    if all_events.is_empty() {
        info!("no raw events found, skipping aggregation");
        return Ok(AggregationReport::default());
    }

    // BTreeMap keeps group processing order deterministic across runs.
    let mut groups: BTreeMap<(String, NaiveDate), Vec<&RawEvent>> = BTreeMap::new();
    for event in &all_events {
        // Events without a timestamp cannot be assigned to a day.
        let Some(day) = event.day() else { continue };
        groups
            .entry((event.site_id.clone(), day))
            .or_default()
            .push(event);
    }
    info!(groups = groups.len(), "grouped events by site and day");

    let mut report = AggregationReport::default();
    for ((site_id, date), group) in &groups {
        match snapshots.find_one(site_id, *date).await {
            Ok(Some(_)) => {
                debug!(site_id = %site_id, date = %date, "snapshot exists, skipping");
                continue;
            }
            Ok(None) => {}
            Err(err) => {
                error!(site_id = %site_id, date = %date, error = %err, "snapshot existence check failed");
                report.failures.push(AggregationFailure {
                    site_id: site_id.clone(),
                    date: *date,
                    error: err.to_string(),
                });
                continue;
            }
        }

        let snapshot = build_daily_snapshot(site_id, *date, group);
        match snapshots.save(&snapshot).await {
            Ok(()) => {
                info!(
                    site_id = %site_id,
                    date = %date,
                    visitors = snapshot.visitors,
                    pageviews = snapshot.pageviews,
                    "snapshot created"
                );
                report.snapshots_created += 1;
            }
            Err(err) => {
                error!(site_id = %site_id, date = %date, error = %err, "snapshot save failed");
                report.failures.push(AggregationFailure {
                    site_id: site_id.clone(),
                    date: *date,
                    error: err.to_string(),
                });
            }
        }
    }

    info!(
        created = report.snapshots_created,
        failed = report.failures.len(),
        "daily aggregation finished"
    );
    Ok(report)
}
