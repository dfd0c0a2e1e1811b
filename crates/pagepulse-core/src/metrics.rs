//! The per-site metrics calculator.
//!
//! Takes the full event set for a site plus the requested range and derives
//! every scalar and top-N metric in one pass family. All-time totals are
//! computed over the unfiltered set (null-timestamp events included);
//! interval-bounded and day-bucketed figures only see events that carry a
//! timestamp inside the resolved window.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::event::RawEvent;
use crate::range::RangeToken;
use crate::rank::{count_by, rank, top_n};
use crate::timeseries::{self, TrendPoint};

pub const TOP_PAGES_LIMIT: usize = 5;
pub const TOP_COUNTRIES_LIMIT: usize = 10;
pub const TOP_SOURCES_LIMIT: usize = 10;
pub const TOP_LOCATIONS_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCount {
    pub url: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryCount {
    pub country: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCount {
    /// `"city, country"`, with `"Unknown"` standing in for a missing city.
    pub location: String,
    pub count: u64,
}

/// The full result of a per-site on-demand computation. Constructed fresh
/// on every query and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeMetrics {
    pub site_id: String,
    pub range: String,
    pub total_visitors_till_date: u64,
    pub today_visitors: u64,
    pub this_week_visitors: u64,
    pub this_month_visitors: u64,
    pub repeat_visitors_today: u64,
    /// ISO date of the busiest day in range, or `"N/A"` with no activity.
    pub peak_visit_day: String,
    pub peak_visit_count: u64,
    pub top_country: String,
    pub top_source: String,
    pub avg_visits_per_day: f64,
    pub avg_visits_per_week: f64,
    pub avg_repeat_visitors_per_day: f64,
    pub top_pages: Vec<PageCount>,
    pub top_countries: Vec<CountryCount>,
    pub top_sources: Vec<SourceCount>,
    pub top_locations: Vec<LocationCount>,
    pub visitor_trends: Vec<TrendPoint>,
    pub generated_at: DateTime<Utc>,
}

impl RangeMetrics {
    /// The documented zero-valued result for a site with no events.
    pub fn empty(site_id: &str, token: RangeToken) -> Self {
        Self {
            site_id: site_id.to_string(),
            range: token.as_str().to_string(),
            total_visitors_till_date: 0,
            today_visitors: 0,
            this_week_visitors: 0,
            this_month_visitors: 0,
            repeat_visitors_today: 0,
            peak_visit_day: "N/A".to_string(),
            peak_visit_count: 0,
            top_country: "Unknown".to_string(),
            top_source: "Direct".to_string(),
            avg_visits_per_day: 0.0,
            avg_visits_per_week: 0.0,
            avg_repeat_visitors_per_day: 0.0,
            top_pages: Vec::new(),
            top_countries: Vec::new(),
            top_sources: Vec::new(),
            top_locations: Vec::new(),
            visitor_trends: Vec::new(),
            generated_at: Utc::now(),
        }
    }
}

fn distinct_visitors<'a, I>(events: I) -> u64
where
    I: IntoIterator<Item = &'a RawEvent>,
{
    events
        .into_iter()
        .map(|e| e.anon_id.as_str())
        .collect::<HashSet<_>>()
        .len() as u64
}

fn in_current_iso_week(day: NaiveDate, today: NaiveDate) -> bool {
    let week = day.iso_week();
    let this_week = today.iso_week();
    week.week() == this_week.week() && week.year() == this_week.year()
}

/// Busiest day and its event count. Ties break on the earliest date so the
/// result does not depend on map iteration order.
fn peak_day(daily_visits: &HashMap<NaiveDate, u64>) -> Option<(NaiveDate, u64)> {
    let mut rows: Vec<(NaiveDate, u64)> = daily_visits.iter().map(|(d, c)| (*d, *c)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.first().copied()
}

/// Compute all metrics for one site over the window selected by `token`,
/// anchored at `today`.
///
/// `all_events` is the site's complete, unfiltered event set; the calculator
/// applies the interval filter internally so the filtered/unfiltered split
/// cannot drift between call sites.
pub fn compute_range_metrics(
    site_id: &str,
    token: RangeToken,
    all_events: &[RawEvent],
    today: NaiveDate,
) -> RangeMetrics {
    if all_events.is_empty() {
        return RangeMetrics::empty(site_id, token);
    }

    let interval = token.resolve(today);
    let filtered: Vec<&RawEvent> = all_events
        .iter()
        .filter(|e| e.day().is_some_and(|d| interval.contains(d)))
        .collect();

    // All-time traffic summary over the unfiltered set.
    let total_visitors_till_date = distinct_visitors(all_events.iter());
    let today_visitors = distinct_visitors(
        all_events.iter().filter(|e| e.day() == Some(today)),
    );
    let this_week_visitors = distinct_visitors(
        all_events
            .iter()
            .filter(|e| e.day().is_some_and(|d| in_current_iso_week(d, today))),
    );
    let this_month_visitors = distinct_visitors(all_events.iter().filter(|e| {
        e.day()
            .is_some_and(|d| d.month() == today.month() && d.year() == today.year())
    }));

    // Visitors active today whose lifetime event count exceeds one.
    let lifetime_counts = count_by(all_events.iter().map(|e| e.anon_id.clone()));
    let repeat_visitors_today = all_events
        .iter()
        .filter(|e| e.day() == Some(today))
        .filter(|e| lifetime_counts.get(&e.anon_id).copied().unwrap_or(0) > 1)
        .map(|e| e.anon_id.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    // Interval-scoped figures.
    let mut daily_visits: HashMap<NaiveDate, u64> = HashMap::new();
    for event in &filtered {
        if let Some(day) = event.day() {
            *daily_visits.entry(day).or_insert(0) += 1;
        }
    }
    let (peak_visit_day, peak_visit_count) = match peak_day(&daily_visits) {
        Some((day, count)) => (day.to_string(), count),
        None => ("N/A".to_string(), 0),
    };

    let country_counts = count_by(filtered.iter().map(|e| e.country.clone()));
    let source_counts = count_by(filtered.iter().filter_map(|e| e.referrer.clone()));
    let page_counts = count_by(filtered.iter().map(|e| e.url.clone()));
    let location_counts = count_by(filtered.iter().map(|e| {
        format!("{}, {}", e.city.as_deref().unwrap_or("Unknown"), e.country)
    }));

    let ranked_countries = rank(country_counts);
    let ranked_sources = rank(source_counts);
    let top_country = ranked_countries
        .first()
        .map_or_else(|| "Unknown".to_string(), |(c, _)| c.clone());
    let top_source = ranked_sources
        .first()
        .map_or_else(|| "Direct".to_string(), |(s, _)| s.clone());

    let days = interval.days() as f64;
    let weeks = interval.weeks() as f64;
    let avg_visits_per_day = filtered.len() as f64 / days;
    let avg_visits_per_week = filtered.len() as f64 / weeks;
    let avg_repeat_visitors_per_day = repeat_visitors_today as f64 / days;

    let visitor_trends = timeseries::generate(token, interval, &filtered);

    RangeMetrics {
        site_id: site_id.to_string(),
        range: token.as_str().to_string(),
        total_visitors_till_date,
        today_visitors,
        this_week_visitors,
        this_month_visitors,
        repeat_visitors_today,
        peak_visit_day,
        peak_visit_count,
        top_country,
        top_source,
        avg_visits_per_day,
        avg_visits_per_week,
        avg_repeat_visitors_per_day,
        top_pages: top_n(page_counts, TOP_PAGES_LIMIT)
            .into_iter()
            .map(|(url, count)| PageCount { url, count })
            .collect(),
        top_countries: ranked_countries
            .into_iter()
            .take(TOP_COUNTRIES_LIMIT)
            .map(|(country, count)| CountryCount { country, count })
            .collect(),
        top_sources: ranked_sources
            .into_iter()
            .take(TOP_SOURCES_LIMIT)
            .map(|(source, count)| SourceCount { source, count })
            .collect(),
        top_locations: top_n(location_counts, TOP_LOCATIONS_LIMIT)
            .into_iter()
            .map(|(location, count)| LocationCount { location, count })
            .collect(),
        visitor_trends,
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn event(site: &str, anon: &str, date: Option<NaiveDate>) -> RawEvent {
        RawEvent {
            id: uuid::Uuid::new_v4().to_string(),
            site_id: site.to_string(),
            event_type: Some("pageview".to_string()),
            anon_id: anon.to_string(),
            url: "/".to_string(),
            referrer: None,
            user_agent: "test-agent".to_string(),
            timestamp: date.map(|d| {
                Utc.from_utc_datetime(&d.and_hms_opt(9, 30, 0).expect("valid time"))
            }),
            country: "Unknown".to_string(),
            city: None,
        }
    }

    #[test]
    fn empty_event_set_yields_documented_zero_result() {
        let metrics = compute_range_metrics("ghost", RangeToken::SevenDays, &[], day(2026, 8, 30));
        assert_eq!(metrics.total_visitors_till_date, 0);
        assert_eq!(metrics.today_visitors, 0);
        assert_eq!(metrics.peak_visit_day, "N/A");
        assert_eq!(metrics.top_country, "Unknown");
        assert_eq!(metrics.top_source, "Direct");
        assert!(metrics.top_pages.is_empty());
        assert!(metrics.visitor_trends.is_empty());
    }

    #[test]
    fn pageviews_equal_filtered_count_and_visitors_bounded_by_it() {
        let today = day(2026, 8, 30);
        let events = vec![
            event("s1", "a", Some(today)),
            event("s1", "a", Some(today)),
            event("s1", "b", Some(today - Duration::days(2))),
        ];
        let metrics = compute_range_metrics("s1", RangeToken::SevenDays, &events, today);
        let pageviews: u64 = metrics.visitor_trends.iter().map(|p| p.pageviews).sum();
        assert_eq!(pageviews, 3);
        assert!(metrics.total_visitors_till_date <= pageviews);
    }

    #[test]
    fn null_timestamp_events_count_all_time_but_not_in_range() {
        let today = day(2026, 8, 30);
        let events = vec![
            event("s1", "a", Some(today)),
            event("s1", "b", None),
            event("s1", "c", None),
        ];
        let metrics = compute_range_metrics("s1", RangeToken::SevenDays, &events, today);
        assert_eq!(metrics.total_visitors_till_date, 3);
        let pageviews: u64 = metrics.visitor_trends.iter().map(|p| p.pageviews).sum();
        assert_eq!(pageviews, 1);
        assert_eq!(metrics.peak_visit_count, 1);
    }

    #[test]
    fn repeat_visitors_today_requires_lifetime_count_above_one() {
        let today = day(2026, 8, 30);
        let events = vec![
            // "a" visited last month and again today — a repeat visitor.
            event("s1", "a", Some(today - Duration::days(40))),
            event("s1", "a", Some(today)),
            // "b" only ever visited today once.
            event("s1", "b", Some(today)),
        ];
        let metrics = compute_range_metrics("s1", RangeToken::SevenDays, &events, today);
        assert_eq!(metrics.today_visitors, 2);
        assert_eq!(metrics.repeat_visitors_today, 1);
    }

    #[test]
    fn peak_day_ties_break_on_earliest_date() {
        let today = day(2026, 8, 30);
        let events = vec![
            event("s1", "a", Some(today)),
            event("s1", "b", Some(today - Duration::days(3))),
        ];
        let metrics = compute_range_metrics("s1", RangeToken::SevenDays, &events, today);
        assert_eq!(metrics.peak_visit_day, (today - Duration::days(3)).to_string());
        assert_eq!(metrics.peak_visit_count, 1);
    }

    #[test]
    fn top_source_defaults_to_direct_when_all_visits_are_referrerless() {
        let today = day(2026, 8, 30);
        let events = vec![event("s1", "a", Some(today))];
        let metrics = compute_range_metrics("s1", RangeToken::SevenDays, &events, today);
        assert_eq!(metrics.top_source, "Direct");
        assert!(metrics.top_sources.is_empty());
    }

    #[test]
    fn top_sources_rank_referrers_by_count() {
        let today = day(2026, 8, 30);
        let mut events = Vec::new();
        for _ in 0..3 {
            let mut e = event("s1", "a", Some(today));
            e.referrer = Some("google.com".to_string());
            events.push(e);
        }
        let mut e = event("s1", "b", Some(today));
        e.referrer = Some("news.ycombinator.com".to_string());
        events.push(e);

        let metrics = compute_range_metrics("s1", RangeToken::SevenDays, &events, today);
        assert_eq!(metrics.top_source, "google.com");
        assert_eq!(metrics.top_sources.len(), 2);
        assert_eq!(metrics.top_sources[0].count, 3);
    }

    #[test]
    fn locations_fall_back_to_unknown_city() {
        let today = day(2026, 8, 30);
        let mut with_city = event("s1", "a", Some(today));
        with_city.country = "PL".to_string();
        with_city.city = Some("Warsaw".to_string());
        let without_city = {
            let mut e = event("s1", "b", Some(today));
            e.country = "PL".to_string();
            e
        };
        let metrics =
            compute_range_metrics("s1", RangeToken::SevenDays, &[with_city, without_city], today);
        let locations: Vec<&str> = metrics
            .top_locations
            .iter()
            .map(|l| l.location.as_str())
            .collect();
        assert!(locations.contains(&"Warsaw, PL"));
        assert!(locations.contains(&"Unknown, PL"));
    }

    #[test]
    fn averages_divide_by_inclusive_days_and_rounded_up_weeks() {
        let today = day(2026, 8, 30);
        let events: Vec<RawEvent> = (0..14).map(|i| event("s1", &format!("v{i}"), Some(today))).collect();
        let metrics = compute_range_metrics("s1", RangeToken::SevenDays, &events, today);
        assert!((metrics.avg_visits_per_day - 2.0).abs() < f64::EPSILON);
        assert!((metrics.avg_visits_per_week - 14.0).abs() < f64::EPSILON);
    }

    #[test]
    fn top_lists_are_bounded_and_sorted_descending() {
        let today = day(2026, 8, 30);
        let mut events = Vec::new();
        for i in 0..12 {
            for _ in 0..=i {
                let mut e = event("s1", "a", Some(today));
                e.url = format!("/page-{i}");
                e.country = format!("C{i}");
                events.push(e);
            }
        }
        let metrics = compute_range_metrics("s1", RangeToken::SevenDays, &events, today);
        assert_eq!(metrics.top_pages.len(), TOP_PAGES_LIMIT);
        assert_eq!(metrics.top_countries.len(), TOP_COUNTRIES_LIMIT);
        assert!(metrics
            .top_pages
            .windows(2)
            .all(|w| w[0].count >= w[1].count));
        assert_eq!(metrics.top_pages[0].url, "/page-11");
    }
}
