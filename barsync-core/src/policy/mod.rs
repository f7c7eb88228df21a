//! Interval policies: freshness gating and provisional-bar trimming.
//!
//! Each interval has one policy object answering two questions:
//! - before any network call: is the last stored bar still current (skip)?
//! - after normalization: is the last fetched bar still forming (trim)?
//!
//! Adding an interval (e.g. monthly bars) means adding a policy here; the
//! reconciler and the orchestrator never branch on the interval themselves.
//!
//! All times are exchange-local wall-clock times (`NaiveDateTime`).

pub mod daily;
pub mod hourly;
pub mod weekly;

pub use daily::DailyPolicy;
pub use hourly::HourlyPolicy;
pub use weekly::WeeklyPolicy;

use crate::domain::{Bar, Interval};
use chrono::NaiveDateTime;

/// Hour (local, 24h clock) after which the daily session and the Friday weekly
/// bar are considered closed.
pub const MARKET_CLOSE_HOUR: u32 = 18;

/// Outcome of the freshness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Fetch,
    Skip,
}

/// Interval-specific sync heuristics.
pub trait IntervalPolicy: Send + Sync {
    /// Policy name (for logging).
    fn name(&self) -> &str;

    /// True if the bar stored at `last_known` is still current at `now`, so
    /// fetching would only return what is already stored.
    fn should_skip(&self, last_known: NaiveDateTime, now: NaiveDateTime) -> bool;

    /// Drop a trailing bar that has not closed yet at `now`. `rows` are in
    /// ascending timestamp order.
    fn trim(&self, rows: Vec<Bar>, now: NaiveDateTime) -> Vec<Bar>;
}

/// Policy for intervals without validated heuristics: always fetch, never trim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPolicy;

impl IntervalPolicy for PassthroughPolicy {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn should_skip(&self, _last_known: NaiveDateTime, _now: NaiveDateTime) -> bool {
        false
    }

    fn trim(&self, rows: Vec<Bar>, _now: NaiveDateTime) -> Vec<Bar> {
        rows
    }
}

/// The policy governing an interval.
pub fn policy_for(interval: &Interval) -> &'static dyn IntervalPolicy {
    match interval {
        Interval::Daily => &DailyPolicy,
        Interval::Hourly => &HourlyPolicy,
        Interval::Weekly => &WeeklyPolicy,
        Interval::Other(_) => &PassthroughPolicy,
    }
}

/// Freshness gate. Pure function of its inputs; a missing last timestamp
/// (empty table) always fetches.
pub fn decide(
    interval: &Interval,
    last_known: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Decision {
    match last_known {
        Some(last) if policy_for(interval).should_skip(last, now) => Decision::Skip,
        _ => Decision::Fetch,
    }
}

/// Provisional-bar trimmer.
pub fn trim(rows: Vec<Bar>, interval: &Interval, now: NaiveDateTime) -> Vec<Bar> {
    policy_for(interval).trim(rows, now)
}
