//! Fetch window resolution.

use chrono::NaiveDateTime;
use std::fmt;

/// Range requested from a quote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWindow {
    /// Everything the source retains for the interval.
    FullHistory,
    /// Rows at or after this timestamp (inclusive). The bar at the boundary is
    /// fetched again on purpose; the reconciler overwrites it.
    From(NaiveDateTime),
}

impl FetchWindow {
    /// Start boundary, if any.
    pub fn start(&self) -> Option<NaiveDateTime> {
        match self {
            Self::FullHistory => None,
            Self::From(start) => Some(*start),
        }
    }

    /// Whether a bar at `timestamp` falls inside the window.
    pub fn admits(&self, timestamp: NaiveDateTime) -> bool {
        self.start().map_or(true, |start| timestamp >= start)
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullHistory => f.write_str("full history"),
            Self::From(start) => write!(f, "from {start}"),
        }
    }
}

/// Resolve the fetch window from the last stored timestamp.
pub fn resolve(last_known: Option<NaiveDateTime>) -> FetchWindow {
    match last_known {
        None => FetchWindow::FullHistory,
        Some(last) => FetchWindow::From(last),
    }
}
