//! Typed cell values.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;

use crate::schema::ColumnType;

/// `H+:M:S`, hours unbounded, minutes and seconds one or two digits.
static DURATION_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(\d+):(\d{1,2}):(\d{1,2})$").ok());

/// Time of day with second resolution that may run past midnight.
///
/// GTFS writes trips ending after midnight as `25:30:10`, so hours are never
/// wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration {
    seconds: u64,
}

impl Duration {
    /// Creates a duration from a total number of seconds.
    #[must_use]
    pub const fn from_seconds(seconds: u64) -> Self {
        Self { seconds }
    }

    /// Creates a duration from hours, minutes and seconds.
    ///
    /// Minutes and seconds past 59 carry over like any other amount of time.
    /// Totals beyond `u64::MAX` seconds saturate.
    #[must_use]
    pub const fn from_hms(hours: u64, minutes: u64, seconds: u64) -> Self {
        Self {
            seconds: hours
                .saturating_mul(3600)
                .saturating_add(minutes.saturating_mul(60))
                .saturating_add(seconds),
        }
    }

    /// Whole hours, unclamped.
    #[must_use]
    pub const fn hours(&self) -> u64 {
        self.seconds / 3600
    }

    /// Minutes past the hour.
    #[must_use]
    pub const fn minutes(&self) -> u64 {
        (self.seconds % 3600) / 60
    }

    /// Seconds past the minute.
    #[must_use]
    pub const fn seconds(&self) -> u64 {
        self.seconds % 60
    }

    /// Total length in seconds.
    #[must_use]
    pub const fn total_seconds(&self) -> u64 {
        self.seconds
    }

    /// Parses `H+:MM:SS`.
    ///
    /// Minutes and seconds may have one or two digits, and values past 59
    /// carry into the next unit, so `12:60:00` is one o'clock. Returns `None`
    /// for anything else.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let pattern = DURATION_PATTERN.as_ref()?;
        let captures = pattern.captures(s.trim())?;
        let hours = captures.get(1)?.as_str().parse::<u64>().ok()?;
        let minutes = captures.get(2)?.as_str().parse::<u64>().ok()?;
        let seconds = captures.get(3)?.as_str().parse::<u64>().ok()?;
        let total = hours.checked_mul(3600)?.checked_add(minutes * 60 + seconds)?;
        Some(Self::from_seconds(total))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours(),
            self.minutes(),
            self.seconds()
        )
    }
}

/// A non-null cell value.
///
/// Every variant corresponds to exactly one [`ColumnType`]; a null cell is
/// represented as `None` at the row level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Boolean flag.
    Boolean(bool),
    /// Calendar day.
    Date(NaiveDate),
    /// Fixed-point number.
    Decimal(Decimal),
    /// Integer.
    Integer(i64),
    /// Time of day, possibly past 24 hours.
    Duration(Duration),
    /// Text.
    Text(String),
}

impl Value {
    /// Returns the column type this value belongs to.
    #[must_use]
    pub const fn kind(&self) -> ColumnType {
        match self {
            Self::Boolean(_) => ColumnType::Boolean,
            Self::Date(_) => ColumnType::Date,
            Self::Decimal(_) => ColumnType::Decimal,
            Self::Integer(_) => ColumnType::Integer,
            Self::Duration(_) => ColumnType::Duration,
            Self::Text(_) => ColumnType::Text,
        }
    }

    /// Returns the text if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the flag if this is a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the number if this is a decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the day if this is a date value.
    #[must_use]
    pub const fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the duration if this is a duration value.
    #[must_use]
    pub const fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}
