//! Closed date and time-of-day ranges produced by temporal resolution.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting inverted bounds.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Range covering a single day.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Inclusive time-of-day window; a `None` bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
}

impl TimeRange {
    /// Build a window. At least one bound must be set and bounds must be ordered.
    pub fn new(start: Option<NaiveTime>, end: Option<NaiveTime>) -> Option<Self> {
        match (start, end) {
            (None, None) => None,
            (Some(s), Some(e)) if s > e => None,
            _ => Some(Self { start, end }),
        }
    }

    /// Window starting at `start` with no upper bound.
    pub fn after(start: NaiveTime) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Window ending at `end` with no lower bound.
    pub fn before(end: NaiveTime) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start.is_none_or(|s| s <= time) && self.end.is_none_or(|e| time <= e)
    }
}
