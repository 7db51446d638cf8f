use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MINUTES_PER_DAY: i64 = 1_440;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("booking window end {end} is before start {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

/// An inclusive span of whole calendar days. A rental occupies every day it
/// touches: `2026-03-10..=2026-03-12` is three chargeable days and the
/// vehicle is unavailable on all of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWindow {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl BookingWindow {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, WindowError> {
        if end_date < start_date {
            return Err(WindowError::EndBeforeStart { start: start_date, end: end_date });
        }
        Ok(Self { start_date, end_date })
    }

    /// Timestamps normalize to their calendar dates. Sub-day precision never
    /// changes what is booked or billed.
    pub fn from_timestamps(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        Self::new(start.date_naive(), end.date_naive())
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Inclusive day count, so a same-day window is one day.
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration_days() * MINUTES_PER_DAY
    }

    /// Closed-interval overlap: two windows sharing a single boundary day
    /// collide.
    pub fn overlaps(&self, other: &BookingWindow) -> bool {
        self.start_date <= other.end_date && self.end_date >= other.start_date
    }

    pub fn overlaps_dates(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }

    pub fn starts_before(&self, day: NaiveDate) -> bool {
        self.start_date < day
    }
}
