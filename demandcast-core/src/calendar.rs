//! Month arithmetic on first-of-month dates.
//!
//! The whole pipeline runs at monthly cadence: every series point, window
//! boundary, and forecast month is a first-of-month `NaiveDate`.

use chrono::{Datelike, NaiveDate};

/// Truncate a date to the first day of its month.
pub fn month_floor(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("first of month is always valid")
}

/// Shift a first-of-month date by `months` (may be negative).
pub fn add_months(month: NaiveDate, months: i32) -> NaiveDate {
    let zero_based = month.year() * 12 + month.month() as i32 - 1 + months;
    let year = zero_based.div_euclid(12);
    let month_of_year = zero_based.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month_of_year, 1).expect("first of month is always valid")
}

/// Period key as YYYYMM, e.g. 2024-03-01 -> 202403.
pub fn period(month: NaiveDate) -> u32 {
    month.year() as u32 * 100 + month.month()
}

/// Inclusive run of consecutive first-of-month dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MonthWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: month_floor(start),
            end: month_floor(end),
        }
    }

    /// Trailing window of `len` months ending at `end` inclusive.
    pub fn trailing(end: NaiveDate, len: u32) -> Self {
        let end = month_floor(end);
        Self {
            start: add_months(end, -(len as i32 - 1)),
            end,
        }
    }

    pub fn contains(&self, month: NaiveDate) -> bool {
        month >= self.start && month <= self.end
    }

    /// Number of months in the window.
    pub fn len(&self) -> usize {
        let span = (self.end.year() - self.start.year()) * 12 + self.end.month() as i32
            - self.start.month() as i32;
        (span + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Every first-of-month date in the window, ascending.
    pub fn months(&self) -> Vec<NaiveDate> {
        let mut out = Vec::with_capacity(self.len());
        let mut cur = self.start;
        while cur <= self.end {
            out.push(cur);
            cur = add_months(cur, 1);
        }
        out
    }
}
