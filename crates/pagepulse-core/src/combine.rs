//! Pure merge step of the multi-site combiner.
//!
//! The async fan-out (one task per roster site, partial-failure isolation)
//! lives in the engine crate; this module only merges the per-site results
//! that actually arrived.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SiteInfo;
use crate::metrics::{CountryCount, PageCount, RangeMetrics, SourceCount};
use crate::range::RangeToken;
use crate::rank::{merge_counts, top_n};
use crate::timeseries::TrendPoint;

pub const COMBINED_TOP_LIMIT: usize = 10;

/// Per-site scalar row inside a combined response, in roster order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteBreakdown {
    pub site_id: String,
    pub site_name: String,
    pub domain: String,
    pub visitors: u64,
    pub today_visitors: u64,
    pub week_visitors: u64,
    pub month_visitors: u64,
    pub repeat_visitors: u64,
}

/// Portfolio-wide merge of per-site [`RangeMetrics`]. Ephemeral, recomputed
/// on every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedMetrics {
    pub range: String,
    pub total_visitors: u64,
    pub total_today_visitors: u64,
    pub total_week_visitors: u64,
    pub total_month_visitors: u64,
    pub total_repeat_visitors: u64,
    /// Exactly the sites whose fetch succeeded.
    pub sites: Vec<SiteBreakdown>,
    pub top_pages: Vec<PageCount>,
    pub top_countries: Vec<CountryCount>,
    pub top_sources: Vec<SourceCount>,
    /// Daily series summed per date across sites. A date present in only
    /// some sites' series is still included, summed from those sites.
    pub daily_visitors: Vec<TrendPoint>,
    pub generated_at: DateTime<Utc>,
}

/// Merge per-site metrics into the portfolio view. `per_site` holds only
/// the sites whose fetch succeeded, paired with their roster entries.
pub fn combine_site_metrics(
    token: RangeToken,
    per_site: &[(SiteInfo, RangeMetrics)],
) -> CombinedMetrics {
    let mut combined = CombinedMetrics {
        range: token.as_str().to_string(),
        total_visitors: 0,
        total_today_visitors: 0,
        total_week_visitors: 0,
        total_month_visitors: 0,
        total_repeat_visitors: 0,
        sites: Vec::with_capacity(per_site.len()),
        top_pages: Vec::new(),
        top_countries: Vec::new(),
        top_sources: Vec::new(),
        daily_visitors: Vec::new(),
        generated_at: Utc::now(),
    };

    let mut page_acc = HashMap::new();
    let mut country_acc = HashMap::new();
    let mut source_acc = HashMap::new();
    let mut daily_acc: HashMap<NaiveDate, TrendPoint> = HashMap::new();

    for (site, metrics) in per_site {
        combined.sites.push(SiteBreakdown {
            site_id: site.site_id.clone(),
            site_name: site.name.clone(),
            domain: site.domain.clone(),
            visitors: metrics.total_visitors_till_date,
            today_visitors: metrics.today_visitors,
            week_visitors: metrics.this_week_visitors,
            month_visitors: metrics.this_month_visitors,
            repeat_visitors: metrics.repeat_visitors_today,
        });

        combined.total_visitors += metrics.total_visitors_till_date;
        combined.total_today_visitors += metrics.today_visitors;
        combined.total_week_visitors += metrics.this_week_visitors;
        combined.total_month_visitors += metrics.this_month_visitors;
        combined.total_repeat_visitors += metrics.repeat_visitors_today;

        merge_counts(
            &mut page_acc,
            metrics.top_pages.iter().map(|p| (p.url.clone(), p.count)),
        );
        merge_counts(
            &mut country_acc,
            metrics
                .top_countries
                .iter()
                .map(|c| (c.country.clone(), c.count)),
        );
        merge_counts(
            &mut source_acc,
            metrics
                .top_sources
                .iter()
                .map(|s| (s.source.clone(), s.count)),
        );

        for point in &metrics.visitor_trends {
            daily_acc
                .entry(point.date)
                .and_modify(|acc| {
                    acc.visitors += point.visitors;
                    acc.pageviews += point.pageviews;
                })
                .or_insert_with(|| point.clone());
        }
    }

    combined.top_pages = top_n(page_acc, COMBINED_TOP_LIMIT)
        .into_iter()
        .map(|(url, count)| PageCount { url, count })
        .collect();
    combined.top_countries = top_n(country_acc, COMBINED_TOP_LIMIT)
        .into_iter()
        .map(|(country, count)| CountryCount { country, count })
        .collect();
    combined.top_sources = top_n(source_acc, COMBINED_TOP_LIMIT)
        .into_iter()
        .map(|(source, count)| SourceCount { source, count })
        .collect();

    let mut daily: Vec<TrendPoint> = daily_acc.into_values().collect();
    daily.sort_by_key(|p| p.date);
    combined.daily_visitors = daily;

    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RangeMetrics;

    fn site(id: &str) -> SiteInfo {
        SiteInfo {
            site_id: id.to_string(),
            name: format!("Site {id}"),
            domain: format!("{id}.example"),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn metrics_with(visitors: u64, pages: &[(&str, u64)], trend: &[(NaiveDate, u64, u64)]) -> RangeMetrics {
        let mut m = RangeMetrics::empty("ignored", RangeToken::SevenDays);
        m.total_visitors_till_date = visitors;
        m.today_visitors = visitors;
        m.top_pages = pages
            .iter()
            .map(|(url, count)| PageCount {
                url: url.to_string(),
                count: *count,
            })
            .collect();
        m.visitor_trends = trend
            .iter()
            .map(|(date, v, p)| TrendPoint {
                date: *date,
                visitors: *v,
                pageviews: *p,
            })
            .collect();
        m
    }

    #[test]
    fn totals_sum_exactly_the_succeeded_sites() {
        let per_site = vec![
            (site("a"), metrics_with(10, &[], &[])),
            (site("b"), metrics_with(5, &[], &[])),
        ];
        let combined = combine_site_metrics(RangeToken::SevenDays, &per_site);
        assert_eq!(combined.total_visitors, 15);
        assert_eq!(combined.sites.len(), 2);
    }

    #[test]
    fn top_pages_are_key_summed_then_reranked() {
        let per_site = vec![
            (site("a"), metrics_with(1, &[("/", 4), ("/docs", 1)], &[])),
            (site("b"), metrics_with(1, &[("/docs", 6)], &[])),
        ];
        let combined = combine_site_metrics(RangeToken::SevenDays, &per_site);
        assert_eq!(combined.top_pages[0].url, "/docs");
        assert_eq!(combined.top_pages[0].count, 7);
        assert_eq!(combined.top_pages[1].count, 4);
    }

    #[test]
    fn daily_series_union_sums_matching_dates() {
        let d1 = day(2026, 8, 28);
        let d2 = day(2026, 8, 29);
        let per_site = vec![
            (site("a"), metrics_with(1, &[], &[(d1, 2, 3), (d2, 1, 1)])),
            // Site "b" has no point for d2 — d2 stays, summed from "a" only.
            (site("b"), metrics_with(1, &[], &[(d1, 4, 5)])),
        ];
        let combined = combine_site_metrics(RangeToken::SevenDays, &per_site);
        assert_eq!(combined.daily_visitors.len(), 2);
        assert_eq!(combined.daily_visitors[0].date, d1);
        assert_eq!(combined.daily_visitors[0].visitors, 6);
        assert_eq!(combined.daily_visitors[0].pageviews, 8);
        assert_eq!(combined.daily_visitors[1].visitors, 1);
    }

    #[test]
    fn combining_nothing_yields_the_zero_portfolio() {
        let combined = combine_site_metrics(RangeToken::All, &[]);
        assert_eq!(combined.total_visitors, 0);
        assert!(combined.sites.is_empty());
        assert!(combined.daily_visitors.is_empty());
    }
}
