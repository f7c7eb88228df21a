//! Hourly bars: skip while the last stored bucket is less than 59 minutes old.

use super::IntervalPolicy;
use crate::domain::Bar;
use chrono::{Duration, NaiveDateTime};

/// Minimum age of the last stored bar before an hourly table is re-fetched.
pub const HOURLY_MIN_AGE_MINUTES: i64 = 59;

#[derive(Debug, Clone, Copy, Default)]
pub struct HourlyPolicy;

impl IntervalPolicy for HourlyPolicy {
    fn name(&self) -> &str {
        "hourly"
    }

    fn should_skip(&self, last_known: NaiveDateTime, now: NaiveDateTime) -> bool {
        now - last_known < Duration::minutes(HOURLY_MIN_AGE_MINUTES)
    }

    // The gate is the only guard for hourly tables.
    fn trim(&self, rows: Vec<Bar>, _now: NaiveDateTime) -> Vec<Bar> {
        rows
    }
}
