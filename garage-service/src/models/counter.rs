//! Month-scoped sequence counters and the `YearMonth` partition key.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar month used to partition job cards, invoices, counters and profit rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(at: &DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Name of the month partition for a base collection, e.g. `invoices-2026-03`.
    pub fn partition(&self, base: &str) -> String {
        format!("{}-{:04}-{:02}", base, self.year, self.month)
    }

    /// Compact form used inside document numbers, e.g. `202603`.
    pub fn compact(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid year-month: {}", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("Invalid year in year-month: {}", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("Invalid month in year-month: {}", s))?;
        YearMonth::new(year, month).ok_or_else(|| format!("Month out of range: {}", s))
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Which document family a sequence number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    JobCard,
    Invoice,
}

impl SequenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            SequenceKind::JobCard => "JC",
            SequenceKind::Invoice => "INV",
        }
    }

    pub fn counter_name(&self) -> &'static str {
        match self {
            SequenceKind::JobCard => "jobcardCounter",
            SequenceKind::Invoice => "invoiceCounter",
        }
    }

    /// Document id of the counter for one month.
    pub fn counter_id(&self, year_month: YearMonth) -> String {
        format!("{}-{}", self.counter_name(), year_month)
    }

    /// At least four digits; counts past 9999 grow wider, so compare issued
    /// numbers with `sequence_count` rather than as strings.
    pub fn format_number(&self, year_month: YearMonth, count: u64) -> String {
        format!("{}-{}-{:04}", self.prefix(), year_month.compact(), count)
    }
}

/// The running count at the end of a formatted sequence number.
pub fn sequence_count(number: &str) -> Option<u64> {
    number.rsplit('-').next()?.parse().ok()
}

/// Per-month sequence source stored in the `counters` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthCounter {
    pub year_month: YearMonth,
    pub count: u64,
}
