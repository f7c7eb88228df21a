//! Daily bars.
//!
//! The gate never skips: a daily table is always refreshed from its last date,
//! which re-fetches that date and lets the reconciler overwrite it. Staleness is
//! handled by the trimmer instead: during a weekday session (before the 18:00
//! close) the source already serves today's bar, but its values are still
//! moving, so it is dropped and picked up on the next run after the close.

use super::{IntervalPolicy, MARKET_CLOSE_HOUR};
use crate::domain::Bar;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

#[derive(Debug, Clone, Copy, Default)]
pub struct DailyPolicy;

impl DailyPolicy {
    /// Monday to Friday, before the close.
    fn session_open(now: NaiveDateTime) -> bool {
        let weekday = !matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
        weekday && now.hour() < MARKET_CLOSE_HOUR
    }
}

impl IntervalPolicy for DailyPolicy {
    fn name(&self) -> &str {
        "daily"
    }

    fn should_skip(&self, _last_known: NaiveDateTime, _now: NaiveDateTime) -> bool {
        false
    }

    fn trim(&self, mut rows: Vec<Bar>, now: NaiveDateTime) -> Vec<Bar> {
        if !Self::session_open(now) {
            return rows;
        }
        if rows.last().is_some_and(|last| last.date() == now.date()) {
            rows.pop();
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::test_support::{at, bar_at};

    fn rows_ending(y: i32, m: u32, d: u32) -> Vec<Bar> {
        let last = at(y, m, d, 0, 0);
        vec![
            bar_at(last - chrono::Duration::days(2)),
            bar_at(last - chrono::Duration::days(1)),
            bar_at(last),
        ]
    }

    #[test]
    fn drops_todays_bar_during_weekday_session() {
        // Wednesday 2024-03-13, 15:00.
        let rows = DailyPolicy.trim(rows_ending(2024, 3, 13), at(2024, 3, 13, 15, 0));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.last().unwrap().date(), at(2024, 3, 12, 0, 0).date());
    }

    #[test]
    fn keeps_todays_bar_after_close() {
        let rows = DailyPolicy.trim(rows_ending(2024, 3, 13), at(2024, 3, 13, 19, 0));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn close_hour_itself_counts_as_closed() {
        let rows = DailyPolicy.trim(rows_ending(2024, 3, 13), at(2024, 3, 13, 18, 0));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn keeps_last_bar_on_saturday_regardless_of_hour() {
        // Saturday 2024-03-16.
        for hour in [0, 9, 15, 23] {
            let rows = DailyPolicy.trim(rows_ending(2024, 3, 16), at(2024, 3, 16, hour, 0));
            assert_eq!(rows.len(), 3, "hour {hour}");
        }
    }

    #[test]
    fn keeps_last_bar_from_a_previous_day() {
        let rows = DailyPolicy.trim(rows_ending(2024, 3, 12), at(2024, 3, 13, 10, 0));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn single_provisional_bar_trims_to_empty() {
        let now = at(2024, 3, 13, 11, 0);
        let rows = DailyPolicy.trim(vec![bar_at(at(2024, 3, 13, 0, 0))], now);
        assert!(rows.is_empty());
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(DailyPolicy.trim(Vec::new(), at(2024, 3, 13, 11, 0)).is_empty());
    }

    #[test]
    fn never_skips() {
        let t = at(2024, 3, 13, 0, 0);
        assert!(!DailyPolicy.should_skip(t, t));
    }
}
