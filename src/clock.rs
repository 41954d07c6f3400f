//! Wall-clock capability.
//!
//! Listing and completion both depend on "now" and "today". They take the
//! time from a [`Clock`] so tests can pin the calendar.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant in epoch milliseconds.
    fn now_ms(&self) -> i64;

    /// Offset used to turn instants into calendar dates.
    fn offset(&self) -> FixedOffset;

    /// Today's calendar date in the clock's offset.
    fn today(&self) -> NaiveDate {
        date_of(self.now_ms(), self.offset())
    }
}

/// Calendar date of an instant in the given offset.
pub fn date_of(ms: i64, offset: FixedOffset) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .with_timezone(&offset)
        .date_naive()
}

/// Build a fixed offset from minutes east of UTC, falling back to UTC when
/// out of range.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(utc)
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Real system time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(utc())
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// A clock frozen at one instant (for tests and one-shot CLI runs).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now_ms: i64,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now_ms: i64, offset: FixedOffset) -> Self {
        Self { now_ms, offset }
    }

    /// Noon UTC on the given date.
    pub fn at_date(date: NaiveDate) -> Self {
        let ms = date
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or_default();
        Self::new(ms, utc())
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now_ms
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}
