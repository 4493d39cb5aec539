//! Calendar bucketing
//!
//! Maps dates to calendar periods. Week buckets follow ISO 8601: weeks start
//! on Monday and week 1 is the first week with at least four days in January.
//! A week bucket is keyed by the year that owns the week, so 2021-01-01 lands
//! in `2020 W53` together with the last days of December 2020.

use crate::error::AnalyticsError;
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Requested bucket size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// Calendar year
    Year,
    /// Calendar quarter
    Quarter,
    /// Calendar month
    Month,
    /// ISO week
    Week,
}

impl Granularity {
    /// All supported granularities
    pub const ALL: [Granularity; 4] = [Self::Year, Self::Quarter, Self::Month, Self::Week];

    /// Lowercase name as accepted by [`FromStr`]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Quarter => "quarter",
            Self::Month => "month",
            Self::Week => "week",
        }
    }
}

impl FromStr for Granularity {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "year" => Ok(Self::Year),
            "quarter" => Ok(Self::Quarter),
            "month" => Ok(Self::Month),
            "week" => Ok(Self::Week),
            _ => Err(AnalyticsError::InvalidGranularity(s.to_string())),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar period
///
/// Keys only compare meaningfully against keys of the same granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    /// Calendar year
    Year(i32),
    /// Quarter 1..=4 of a year
    Quarter {
        /// Calendar year
        year: i32,
        /// Quarter number
        quarter: u32,
    },
    /// Month 1..=12 of a year
    Month {
        /// Calendar year
        year: i32,
        /// Month number
        month: u32,
    },
    /// ISO week of its week-owning year
    Week {
        /// ISO week-numbering year
        year: i32,
        /// Week number 1..=53
        week: u32,
    },
}

impl BucketKey {
    /// Display label of this period
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year(year) => write!(f, "{}", year),
            Self::Quarter { year, quarter } => write!(f, "{} Q{}", year, quarter),
            Self::Month { year, month } => write!(f, "{}-{:02}", year, month),
            Self::Week { year, week } => write!(f, "{} W{}", year, week),
        }
    }
}

/// Bucket a date at the given granularity
pub fn bucket(date: NaiveDate, granularity: Granularity) -> BucketKey {
    match granularity {
        Granularity::Year => BucketKey::Year(date.year()),
        Granularity::Quarter => BucketKey::Quarter {
            year: date.year(),
            quarter: (date.month() - 1) / 3 + 1,
        },
        Granularity::Month => BucketKey::Month {
            year: date.year(),
            month: date.month(),
        },
        Granularity::Week => {
            let iso = date.iso_week();
            BucketKey::Week {
                year: iso.year(),
                week: iso.week(),
            }
        },
    }
}

/// Display label of a bucket key
pub fn label(key: &BucketKey) -> String {
    key.label()
}
