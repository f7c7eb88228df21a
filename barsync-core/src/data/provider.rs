//! Quote source trait, raw batch type and structured data errors.
//!
//! The QuoteSource trait abstracts over where bars come from (Yahoo Finance,
//! CSV exports) so the sync engine can be driven by a scripted source in tests.

use crate::domain::Interval;
use crate::sync::window::FetchWindow;
use chrono::NaiveDateTime;
use thiserror::Error;

/// Column label as delivered by a source. Sources that qualify fields by
/// ticker (e.g. `("Adj Close", "^FCHI")`) produce multi-level labels; the
/// first level is the primary label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLabel(Vec<String>);

impl ColumnLabel {
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(levels.into_iter().map(Into::into).collect())
    }

    /// Single-level label.
    pub fn single(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn levels(&self) -> &[String] {
        &self.0
    }

    /// First level, or the empty string for an empty label.
    pub fn primary(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }
}

/// One column of a raw batch. `None` is a missing observation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub label: ColumnLabel,
    pub values: Vec<Option<f64>>,
}

/// A fetched batch before normalization: a timestamp index and labelled
/// numeric columns, in whatever order and naming the source produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub index: Vec<NaiveDateTime>,
    pub columns: Vec<RawColumn>,
}

impl RawBatch {
    pub fn new(index: Vec<NaiveDateTime>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, label: ColumnLabel, values: Vec<Option<f64>>) -> Self {
        self.columns.push(RawColumn { label, values });
        self
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Keep only observations at or after `start`.
    pub fn retain_from(&mut self, start: NaiveDateTime) {
        let keep: Vec<bool> = self.index.iter().map(|ts| *ts >= start).collect();
        let mut it = keep.iter();
        self.index.retain(|_| *it.next().unwrap_or(&false));
        for column in &mut self.columns {
            let mut it = keep.iter();
            column.values.retain(|_| *it.next().unwrap_or(&false));
        }
    }
}

/// Structured error types for quote sources.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("unsupported interval '{0}' for this source")]
    UnsupportedInterval(String),

    #[error("csv error in {path}: {reason}")]
    Csv { path: String, reason: String },
}

/// Trait for quote sources.
///
/// `fetch` returns the rows at or after the window start (inclusive) for the
/// requested interval. An empty batch means "nothing available" and is not an
/// error. The batch may include the current, still-forming bar.
pub trait QuoteSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn fetch(
        &self,
        ticker: &str,
        window: &FetchWindow,
        interval: &Interval,
    ) -> Result<RawBatch, DataError>;
}
