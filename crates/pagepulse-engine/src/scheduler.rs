//! Midnight aggregation loop.
//!
//! The administrative trigger and the schedule both go through
//! [`run_once`], so the two paths cannot drift apart. The loop itself
//! never exits on failure — a bad run is logged and the next midnight
//! tries again.

use chrono::Utc;
use tracing::{error, info};

use crate::aggregation::AggregationReport;
use crate::engine::AnalyticsEngine;

pub async fn run_once(engine: &AnalyticsEngine) -> anyhow::Result<AggregationReport> {
    engine.run_daily_aggregation().await
}

/// Sleep until the next UTC midnight, run the aggregation, repeat.
///
/// Intended to be `tokio::spawn`ed once per process. Overlapping runs are
/// not possible from this loop alone, but deployments running multiple
/// processes must add their own exclusive lock.
pub async fn run_scheduler_loop(engine: AnalyticsEngine) {
    info!("daily aggregation scheduler started");
    loop {
        let now = Utc::now();
        let tomorrow = now.date_naive() + chrono::Duration::days(1);
        let next_midnight = tomorrow
            .and_hms_opt(0, 0, 0)
            .expect("valid time")
            .and_utc();
        let secs_until = (next_midnight - now).num_seconds().max(1) as u64;
        tokio::time::sleep(std::time::Duration::from_secs(secs_until)).await;

        match run_once(&engine).await {
            Ok(report) if report.is_clean() => {
                info!(
                    created = report.snapshots_created,
                    "scheduled aggregation run completed"
                );
            }
            Ok(report) => {
                error!(
                    created = report.snapshots_created,
                    failed = report.failures.len(),
                    "scheduled aggregation run completed with failures"
                );
            }
            Err(err) => {
                error!(error = %err, "scheduled aggregation run failed");
            }
        }
    }
}
