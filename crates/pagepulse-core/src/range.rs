//! Symbolic range tokens and their resolution to concrete date intervals.

use chrono::{Duration, NaiveDate};
use thiserror::Error;

/// A symbolic string selecting a relative date window.
///
/// `1m` and `30d` are spellings of the same 30-day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeToken {
    SevenDays,
    ThirtyDays,
    OneYear,
    FiveYears,
    All,
}

#[derive(Debug, Error)]
#[error("invalid range: {token}. Supported values: 7d, 1m, 30d, 1y, 5y, all")]
pub struct RangeError {
    pub token: String,
}

/// An inclusive calendar-day interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }

    /// Number of calendar days covered, both endpoints inclusive.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Number of weeks covered, rounded up to whole weeks.
    pub fn weeks(&self) -> i64 {
        (self.days() + 6) / 7
    }
}

/// Earliest date the `all` range reaches back to. No site in the portfolio
/// predates it.
pub fn all_time_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date")
}

impl RangeToken {
    /// Parse a range token, case-insensitively. Unrecognized tokens fail
    /// fast — there is deliberately no default range at this layer.
    pub fn parse(raw: &str) -> Result<Self, RangeError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "7d" => Ok(Self::SevenDays),
            "1m" | "30d" => Ok(Self::ThirtyDays),
            "1y" => Ok(Self::OneYear),
            "5y" => Ok(Self::FiveYears),
            "all" => Ok(Self::All),
            _ => Err(RangeError {
                token: raw.to_string(),
            }),
        }
    }

    /// Canonical spelling used when echoing the range back in responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
            Self::OneYear => "1y",
            Self::FiveYears => "5y",
            Self::All => "all",
        }
    }

    /// Resolve to a concrete interval anchored at `today`.
    ///
    /// Windows include `today`: `7d` spans exactly 7 calendar days ending
    /// today, so `start = today - 6d`. The same inclusive convention applies
    /// to every token and every call site.
    pub fn resolve(&self, today: NaiveDate) -> DateInterval {
        let start = match self {
            Self::SevenDays => today - Duration::days(6),
            Self::ThirtyDays => today - Duration::days(29),
            Self::OneYear => today - Duration::days(364),
            Self::FiveYears => today - Duration::days(1824),
            Self::All => all_time_epoch(),
        };
        DateInterval { start, end: today }
    }
}
