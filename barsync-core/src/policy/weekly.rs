//! Weekly bars.
//!
//! A week's bar keeps changing until the Friday close. While the last stored
//! bar belongs to the current ISO week the table is skipped, except on Friday
//! from 18:00 when the week is considered consolidated and one final fetch
//! picks up the closing values.

use super::{IntervalPolicy, MARKET_CLOSE_HOUR};
use crate::domain::Bar;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

#[derive(Debug, Clone, Copy, Default)]
pub struct WeeklyPolicy;

impl WeeklyPolicy {
    fn week_consolidated(now: NaiveDateTime) -> bool {
        now.weekday() == Weekday::Fri && now.hour() >= MARKET_CLOSE_HOUR
    }
}

impl IntervalPolicy for WeeklyPolicy {
    fn name(&self) -> &str {
        "weekly"
    }

    fn should_skip(&self, last_known: NaiveDateTime, now: NaiveDateTime) -> bool {
        // IsoWeek compares (ISO year, week number).
        let same_week = last_known.iso_week() == now.iso_week();
        same_week && !Self::week_consolidated(now)
    }

    // The gate is the only guard for weekly tables.
    fn trim(&self, rows: Vec<Bar>, _now: NaiveDateTime) -> Vec<Bar> {
        rows
    }
}
