//! CSV quote source for offline backfills.
//!
//! Reads yfinance-style exports from a directory, one file per ticker and
//! interval: `{dir}/{ticker}_{interval}.csv`, with characters outside
//! `[A-Za-z0-9.-]` in the ticker replaced by `_` (`^FCHI` → `_FCHI_1d.csv`).
//!
//! Two header layouts are accepted:
//!
//! ```text
//! Date,Open,High,Low,Close,Adj Close,Volume
//! ```
//!
//! and the multi-level layout newer yfinance versions write:
//!
//! ```text
//! Price,Close,High,Low,Open,Volume
//! Ticker,^FCHI,^FCHI,^FCHI,^FCHI,^FCHI
//! Date,,,,,
//! ```

use super::provider::{ColumnLabel, DataError, QuoteSource, RawBatch, RawColumn};
use crate::domain::Interval;
use crate::sync::window::FetchWindow;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Timestamp layouts found in exports, tried in order.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%:z"];

pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File the source reads for a ticker and interval.
    pub fn path_for(&self, ticker: &str, interval: &Interval) -> PathBuf {
        let stem: String = ticker
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{stem}_{}.csv", interval.code()))
    }

    /// Read a whole export file.
    pub fn read_file(path: &Path) -> Result<RawBatch, DataError> {
        let file = File::open(path).map_err(|e| csv_error(path, e))?;
        parse(file, path)
    }
}

impl QuoteSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        ticker: &str,
        window: &FetchWindow,
        interval: &Interval,
    ) -> Result<RawBatch, DataError> {
        let path = self.path_for(ticker, interval);
        debug!(path = %path.display(), "reading csv export");
        let mut batch = Self::read_file(&path)?;
        if let Some(start) = window.start() {
            batch.retain_from(start);
        }
        Ok(batch)
    }
}

fn csv_error(path: &Path, e: impl std::fmt::Display) -> DataError {
    DataError::Csv {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

fn parse(reader: impl Read, path: &Path) -> Result<RawBatch, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = rdr.records();
    let mut next = || records.next().transpose().map_err(|e| csv_error(path, e));

    let Some(header) = next()? else {
        return Ok(RawBatch::default());
    };

    // Field names, one per value column (the first column is the index).
    let primary: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
    let mut second_level: Option<Vec<String>> = None;

    let mut pending = None;
    if header.get(0) == Some("Price") {
        while let Some(row) = next()? {
            match row.get(0) {
                Some("Ticker") => {
                    second_level = Some(row.iter().skip(1).map(str::to_string).collect());
                }
                Some("Date") | Some("Datetime") if row.iter().skip(1).all(str::is_empty) => {}
                _ => {
                    pending = Some(row);
                    break;
                }
            }
        }
    }

    let mut columns: Vec<RawColumn> = primary
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let label = match second_level.as_ref().and_then(|l| l.get(i)) {
                Some(ticker) => ColumnLabel::new([name.as_str(), ticker.as_str()]),
                None => ColumnLabel::single(name.as_str()),
            };
            RawColumn {
                label,
                values: Vec::new(),
            }
        })
        .collect();
    let mut index = Vec::new();

    let mut line = 0usize;
    while let Some(row) = match pending.take() {
        Some(row) => Some(row),
        None => next()?,
    } {
        line += 1;
        let Some(stamp) = row.get(0).filter(|s| !s.is_empty()) else {
            continue;
        };
        index.push(
            parse_timestamp(stamp)
                .ok_or_else(|| csv_error(path, format!("data row {line}: bad timestamp '{stamp}'")))?,
        );
        for (i, column) in columns.iter_mut().enumerate() {
            let cell = row.get(i + 1).unwrap_or("");
            let value = if cell.is_empty() {
                None
            } else {
                Some(cell.parse::<f64>().map_err(|_| {
                    csv_error(path, format!("data row {line}: bad number '{cell}'"))
                })?)
            };
            column.values.push(value);
        }
    }

    Ok(RawBatch { index, columns })
}

/// Timestamps with an offset keep their local wall-clock time.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(s, f).ok())
        .map(|dt| dt.naive_local())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::normalize::Normalizer;

    fn parse_str(s: &str) -> Result<RawBatch, DataError> {
        parse(s.as_bytes(), Path::new("inline.csv"))
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn path_replaces_symbols_in_ticker() {
        let source = CsvSource::new("/data");
        assert_eq!(
            source.path_for("^FCHI", &Interval::Daily),
            PathBuf::from("/data/_FCHI_1d.csv")
        );
        assert_eq!(
            source.path_for("BRK-B", &Interval::Weekly),
            PathBuf::from("/data/BRK-B_1wk.csv")
        );
    }

    #[test]
    fn single_header_export() {
        let batch = parse_str(
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2024-01-02,10,11,9,10.5,10.4,1000\n\
             2024-01-03,10.5,12,10,11.5,,\n",
        )
        .unwrap();
        assert_eq!(batch.index, vec![day(2), day(3)]);
        assert_eq!(batch.columns[4].label, ColumnLabel::single("Adj Close"));
        assert_eq!(batch.columns[4].values, vec![Some(10.4), None]);

        let bars = Normalizer::normalize(&batch);
        assert_eq!(bars[1].adj_close, 0.0);
        assert_eq!(bars[1].volume, None);
    }

    #[test]
    fn multi_level_header_export() {
        let batch = parse_str(
            "Price,Close,High,Low,Open,Volume\n\
             Ticker,^FCHI,^FCHI,^FCHI,^FCHI,^FCHI\n\
             Date,,,,,\n\
             2024-01-02,7530.9,7586.6,7503.1,7543.2,68000100\n",
        )
        .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.columns[0].label, ColumnLabel::new(["Close", "^FCHI"]));

        let bars = Normalizer::normalize(&batch);
        assert_eq!(bars[0].open, 7543.2);
        assert_eq!(bars[0].close, 7530.9);
    }

    #[test]
    fn offset_timestamps_keep_local_time() {
        let batch = parse_str(
            "Datetime,Close\n\
             2024-01-02 09:00:00+01:00,1\n\
             2024-01-02 10:00:00,2\n",
        )
        .unwrap();
        assert_eq!(batch.index[0], day(2) + chrono::Duration::hours(9));
        assert_eq!(batch.index[1], day(2) + chrono::Duration::hours(10));
    }

    #[test]
    fn bad_number_names_the_row() {
        let err = parse_str("Date,Close\n2024-01-02,abc\n").unwrap_err();
        assert!(err.to_string().contains("data row 1"), "{err}");
    }

    #[test]
    fn empty_file_is_empty_batch() {
        assert!(parse_str("").unwrap().is_empty());
        assert!(parse_str("Date,Close\n").unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_a_csv_error() {
        let source = CsvSource::new("/nonexistent-barsync-dir");
        let err = source
            .fetch("^FCHI", &FetchWindow::FullHistory, &Interval::Daily)
            .unwrap_err();
        assert!(matches!(err, DataError::Csv { .. }));
    }
}
