//! Calendar-bucketed visitor/pageview series.
//!
//! Granularity follows the requested range token, not the interval length:
//! short ranges chart per day, `1y` per month, `5y` per year. Every bucket
//! in range is emitted even with zero activity — clients draw complete axes
//! from the series, so gap-filling is a correctness property here.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::event::RawEvent;
use crate::range::{DateInterval, RangeToken};

/// One bucket of the trend series. For monthly and yearly buckets, `date`
/// is the bucket's first calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    /// Distinct visitors active inside the bucket.
    pub visitors: u64,
    pub pageviews: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    fn for_token(token: RangeToken) -> Self {
        match token {
            RangeToken::SevenDays | RangeToken::ThirtyDays | RangeToken::All => Self::Day,
            RangeToken::OneYear => Self::Month,
            RangeToken::FiveYears => Self::Year,
        }
    }

    fn bucket_of(&self, day: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => day,
            Self::Month => first_of_month(day.year(), day.month()),
            Self::Year => first_of_month(day.year(), 1),
        }
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).expect("valid date")
}

/// `months` whole months before the first of `year`/`month`.
fn months_back(year: i32, month: u32, months: i32) -> NaiveDate {
    let total = year * 12 + month as i32 - 1 - months;
    first_of_month(total.div_euclid(12), total.rem_euclid(12) as u32 + 1)
}

/// Bucket starts for the series, oldest first. The final bucket never
/// extends past `interval.end` — it is simply the bucket containing it.
fn bucket_starts(granularity: Granularity, interval: DateInterval) -> Vec<NaiveDate> {
    match granularity {
        Granularity::Day => {
            let mut days = Vec::with_capacity(interval.days().max(0) as usize);
            let mut day = interval.start;
            while day <= interval.end {
                days.push(day);
                day += Duration::days(1);
            }
            days
        }
        // 12 calendar months ending at the month containing `end`.
        Granularity::Month => (0..12)
            .rev()
            .map(|i| months_back(interval.end.year(), interval.end.month(), i))
            .collect(),
        // 5 calendar years ending at the year containing `end`.
        Granularity::Year => (0..5)
            .rev()
            .map(|i| first_of_month(interval.end.year() - i, 1))
            .collect(),
    }
}

/// Produce the complete, gap-filled series for `events` (already filtered
/// to the interval) at the granularity implied by `token`.
pub fn generate(token: RangeToken, interval: DateInterval, events: &[&RawEvent]) -> Vec<TrendPoint> {
    let granularity = Granularity::for_token(token);

    let mut pageviews: HashMap<NaiveDate, u64> = HashMap::new();
    let mut visitors: HashMap<NaiveDate, HashSet<&str>> = HashMap::new();
    for event in events {
        let Some(day) = event.day() else { continue };
        let bucket = granularity.bucket_of(day);
        *pageviews.entry(bucket).or_insert(0) += 1;
        visitors.entry(bucket).or_default().insert(&event.anon_id);
    }

    bucket_starts(granularity, interval)
        .into_iter()
        .map(|date| TrendPoint {
            date,
            visitors: visitors.get(&date).map_or(0, |set| set.len() as u64),
            pageviews: pageviews.get(&date).copied().unwrap_or(0),
        })
        .collect()
}
