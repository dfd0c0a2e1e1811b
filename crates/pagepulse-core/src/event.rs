use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One recorded visitor action on a site.
///
/// Created once at ingestion and immutable thereafter. The rollup engine
/// never updates or deletes events — retention is handled outside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: String,
    pub site_id: String,
    pub event_type: Option<String>,
    /// Pseudonymous visitor identifier. Distinct-visitor counts are distinct
    /// `anon_id` counts.
    pub anon_id: String,
    pub url: String,
    /// Traffic source. `None` means a direct visit.
    pub referrer: Option<String>,
    pub user_agent: String,
    /// Events without a timestamp are excluded from interval-bounded and
    /// day-bucketed computations but still count toward all-time totals.
    pub timestamp: Option<DateTime<Utc>>,
    /// Resolved at ingestion; `"Unknown"` when resolution failed.
    pub country: String,
    pub city: Option<String>,
}

impl RawEvent {
    /// Calendar day of the event, if it carries a timestamp.
    pub fn day(&self) -> Option<NaiveDate> {
        self.timestamp.map(|ts| ts.date_naive())
    }
}
