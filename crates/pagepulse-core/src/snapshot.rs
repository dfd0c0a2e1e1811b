//! Daily snapshots and the rollup reader over them.
//!
//! A snapshot is the write-once rollup of all events for one `(site, day)`
//! pair. The builder here is the single source of snapshot semantics; the
//! aggregation job in the engine crate only handles grouping, the existence
//! check, and persistence.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::event::RawEvent;
use crate::metrics::{CountryCount, PageCount};
use crate::range::RangeToken;
use crate::rank::{count_by, merge_counts, top_n};

/// Top lists inside a snapshot are capped at five entries.
pub const SNAPSHOT_TOP_LIMIT: usize = 5;

/// An immutable daily rollup of events for one site.
///
/// At most one snapshot exists per `(site_id, date)`; the store enforces
/// this and the aggregation job checks before writing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub id: String,
    pub site_id: String,
    pub date: NaiveDate,
    /// Distinct `anon_id` count for the day.
    pub visitors: u64,
    /// Raw event count for the day.
    pub pageviews: u64,
    pub top_pages: Vec<PageCount>,
    pub top_countries: Vec<CountryCount>,
}

/// Build the snapshot for one day's worth of a site's events.
///
/// `events` must already be scoped to `(site_id, date)` — the builder does
/// not re-check. Top lists use the same rank-then-truncate policy as the
/// metrics calculator, with ties broken by ascending key.
pub fn build_daily_snapshot(site_id: &str, date: NaiveDate, events: &[&RawEvent]) -> DailySnapshot {
    let visitors = events
        .iter()
        .map(|e| e.anon_id.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len() as u64;

    let page_counts = count_by(events.iter().map(|e| e.url.clone()));
    let country_counts = count_by(events.iter().map(|e| e.country.clone()));

    DailySnapshot {
        id: uuid::Uuid::new_v4().to_string(),
        site_id: site_id.to_string(),
        date,
        visitors,
        pageviews: events.len() as u64,
        top_pages: top_n(page_counts, SNAPSHOT_TOP_LIMIT)
            .into_iter()
            .map(|(url, count)| PageCount { url, count })
            .collect(),
        top_countries: top_n(country_counts, SNAPSHOT_TOP_LIMIT)
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect(),
    }
}

/// Range summary answered from pre-computed snapshots, without rescanning
/// raw events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupSummary {
    pub site_id: String,
    pub range: String,
    /// Sum of per-day distinct visitors. A visitor active on several days
    /// counts once per day — this is a property of daily rollups, not a bug.
    pub total_visitors: u64,
    pub total_pageviews: u64,
    pub top_pages: Vec<PageCount>,
    pub top_countries: Vec<CountryCount>,
    /// Date of the most recent snapshot in range; `None` when the range is
    /// empty.
    pub last_updated: Option<NaiveDate>,
}

/// Aggregate snapshots overlapping a range into one summary. An empty
/// snapshot set produces the zero-valued summary rather than an error.
pub fn rollup_snapshots(
    site_id: &str,
    token: RangeToken,
    snapshots: &[DailySnapshot],
) -> RollupSummary {
    let mut page_acc = std::collections::HashMap::new();
    let mut country_acc = std::collections::HashMap::new();
    let mut total_visitors = 0;
    let mut total_pageviews = 0;
    let mut last_updated: Option<NaiveDate> = None;

    for snapshot in snapshots {
        total_visitors += snapshot.visitors;
        total_pageviews += snapshot.pageviews;
        merge_counts(
            &mut page_acc,
            snapshot.top_pages.iter().map(|p| (p.url.clone(), p.count)),
        );
        merge_counts(
            &mut country_acc,
            snapshot
                .top_countries
                .iter()
                .map(|c| (c.country.clone(), c.count)),
        );
        last_updated = Some(match last_updated {
            Some(latest) => latest.max(snapshot.date),
            None => snapshot.date,
        });
    }

    RollupSummary {
        site_id: site_id.to_string(),
        range: token.as_str().to_string(),
        total_visitors,
        total_pageviews,
        top_pages: top_n(page_acc, SNAPSHOT_TOP_LIMIT)
            .into_iter()
            .map(|(url, count)| PageCount { url, count })
            .collect(),
        top_countries: top_n(country_acc, SNAPSHOT_TOP_LIMIT)
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect(),
        last_updated,
    }
}
