//! Bar: one OHLCV observation for a fixed time bucket.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A normalized bar, as produced by the normalizer and consumed by the trimmer
/// and the reconciler.
///
/// `timestamp` is the bucket start in exchange-local time. Prices are never
/// missing at this stage (the normalizer substitutes 0.0). Volume keeps the
/// source value untouched; whether it is stored is decided by
/// [`Bar::stored_volume`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: Option<f64>,
}

impl Bar {
    /// Calendar date of the bucket start.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Volume as written to storage: a defined, strictly positive number is
    /// truncated to an integer. Zero, negative, NaN and missing volumes become
    /// `None` (NULL).
    pub fn stored_volume(&self) -> Option<i64> {
        match self.volume {
            Some(v) if v.is_finite() && v > 0.0 => Some(v as i64),
            _ => None,
        }
    }

    /// The non-key columns written for this bar.
    pub fn fields(&self) -> BarFields {
        BarFields {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            adj_close: self.adj_close,
            volume: self.stored_volume(),
        }
    }
}

/// Non-key columns of a stored row. Every sync pass that re-fetches a
/// timestamp overwrites all of them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarFields {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: Option<i64>,
}

/// A row as it sits in storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredBar {
    pub timestamp: NaiveDateTime,
    pub fields: BarFields,
}
