//! Yahoo Finance quote source.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API. One request per fetch, no
//! retries: a failed request fails the pass and the next run picks it up.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.
//! The CSV source is the fallback when Yahoo is unavailable.

use super::provider::{ColumnLabel, DataError, QuoteSource, RawBatch};
use crate::domain::Interval;
use crate::sync::window::FetchWindow;
use chrono::{DateTime, Datelike, Duration, NaiveDateTime, NaiveTime, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

const CHART_API: &str = "https://query2.finance.yahoo.com/v8/finance/chart/";

/// Interval codes the chart API accepts.
const SUPPORTED_INTERVALS: &[&str] = &[
    "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
];

/// Start of a full-history request for intervals without an intraday limit,
/// early on 1900-01-01.
const EARLIEST_PERIOD1: i64 = -2_208_994_789;

/// How far back the chart API serves intraday intervals.
fn intraday_history_limit(code: &str) -> Option<Duration> {
    match code {
        "1m" => Some(Duration::days(7)),
        "2m" | "5m" | "15m" | "30m" | "90m" => Some(Duration::days(60)),
        "60m" | "1h" => Some(Duration::days(730)),
        _ => None,
    }
}

/// `60m` and `1h` name the same bucket.
fn same_granularity(a: &str, b: &str) -> bool {
    fn canonical(code: &str) -> &str {
        if code == "60m" { "1h" } else { code }
    }
    canonical(a) == canonical(b)
}

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC, in seconds.
    gmtoffset: Option<i64>,
    #[serde(rename = "dataGranularity")]
    data_granularity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance quote source.
pub struct YahooSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooSource {
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(CHART_API)
    }

    /// Point the source at another chart endpoint (a mirror or a local stub).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Build the chart API URL for a ticker, window and interval.
    ///
    /// Full history runs from 1900 for daily and coarser intervals, and from
    /// the API's lookback limit for intraday ones. An incremental window
    /// starts one day early so the exchange offset never hides the boundary
    /// bar; the surplus is filtered out after parsing.
    fn chart_url(
        base_url: &str,
        ticker: &str,
        window: &FetchWindow,
        interval: &Interval,
        now: DateTime<Utc>,
    ) -> Result<Url, DataError> {
        let code = interval.code();
        if !SUPPORTED_INTERVALS.contains(&code) {
            return Err(DataError::UnsupportedInterval(code.to_string()));
        }

        let mut url = Url::parse(base_url)
            .map_err(|e| DataError::ResponseFormatChanged(format!("bad chart url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DataError::ResponseFormatChanged("chart url cannot take a path".into()))?
            .pop_if_empty()
            .push(ticker);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("interval", code)
                .append_pair("includeAdjustedClose", "true");
            let period1 = match window {
                FetchWindow::FullHistory => match intraday_history_limit(code) {
                    Some(limit) => (now - limit).timestamp(),
                    None => EARLIEST_PERIOD1,
                },
                FetchWindow::From(start) => (*start - Duration::days(1)).and_utc().timestamp(),
            };
            query
                .append_pair("period1", &period1.to_string())
                .append_pair("period2", &now.timestamp().to_string());
        }
        Ok(url)
    }

    /// Parse the chart API response into a raw batch of exchange-local bars.
    ///
    /// Timestamps are moved to their bucket start. While the market is open
    /// the chart API may return the live quote as an extra row inside the
    /// current bucket; rows sharing a bucket are merged into one.
    fn parse_response(
        ticker: &str,
        interval: &Interval,
        resp: ChartResponse,
    ) -> Result<RawBatch, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // No timestamps: the ticker exists but has nothing in this window.
        let Some(timestamps) = data.timestamp else {
            return Ok(RawBatch::default());
        };

        let meta = data.meta.unwrap_or_default();
        if let Some(granularity) = &meta.data_granularity {
            if !same_granularity(granularity, interval.code()) {
                return Err(DataError::ResponseFormatChanged(format!(
                    "asked for {} bars, got {granularity}",
                    interval.code()
                )));
            }
        }

        let offset = meta.gmtoffset.unwrap_or(0);
        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose)
            .unwrap_or_default();

        let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

        let mut index = Vec::with_capacity(timestamps.len());
        let mut columns: [Vec<Option<f64>>; 6] = Default::default();
        for (i, &ts) in timestamps.iter().enumerate() {
            let row = [
                at(&quote.open, i),
                at(&quote.high, i),
                at(&quote.low, i),
                at(&quote.close, i),
                at(&adj_closes, i),
                at(&quote.volume, i),
            ];
            // Holidays and halted sessions come back as all-null rows.
            if row.iter().all(Option::is_none) {
                continue;
            }

            let start = bucket_start(ts, offset, interval)?;
            if index.last() == Some(&start) {
                merge_into_last(&mut columns, row, interval);
                continue;
            }
            index.push(start);
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        let [open, high, low, close, adj_close, volume] = columns;
        let label = |field: &str| ColumnLabel::new([field, ticker]);
        Ok(RawBatch::new(index)
            .with_column(label("Open"), open)
            .with_column(label("High"), high)
            .with_column(label("Low"), low)
            .with_column(label("Close"), close)
            .with_column(label("Adj Close"), adj_close)
            .with_column(label("Volume"), volume))
    }
}

/// Unix seconds → exchange-local bucket start. Daily bars start at midnight,
/// weekly bars at midnight on the Monday of their week.
fn bucket_start(ts: i64, offset: i64, interval: &Interval) -> Result<NaiveDateTime, DataError> {
    let local = DateTime::from_timestamp(ts + offset, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
    match interval {
        Interval::Weekly => {
            let back = i64::from(local.weekday().num_days_from_monday());
            Ok((local.date() - Duration::days(back)).and_time(NaiveTime::MIN))
        }
        Interval::Daily => Ok(local.date().and_time(NaiveTime::MIN)),
        _ => Ok(local),
    }
}

/// Fold a row into the last row of its bucket.
///
/// A later daily row replaces the earlier one. A weekly live row extends the
/// week: open is kept, high and low widen, close moves to the live quote and
/// volumes add up. Missing values never overwrite present ones.
fn merge_into_last(
    columns: &mut [Vec<Option<f64>>; 6],
    row: [Option<f64>; 6],
    interval: &Interval,
) {
    let latest: fn(f64, f64) -> f64 = |_, b| b;
    let rules: [fn(f64, f64) -> f64; 6] = if *interval == Interval::Weekly {
        [|a: f64, _: f64| a, f64::max, f64::min, latest, latest, |a: f64, b: f64| a + b]
    } else {
        [latest; 6]
    };
    for ((column, value), rule) in columns.iter_mut().zip(row).zip(rules) {
        if let Some(slot) = column.last_mut() {
            *slot = match (*slot, value) {
                (Some(a), Some(b)) => Some(rule(a, b)),
                (a, b) => b.or(a),
            };
        }
    }
}

impl QuoteSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        ticker: &str,
        window: &FetchWindow,
        interval: &Interval,
    ) -> Result<RawBatch, DataError> {
        let url = Self::chart_url(&self.base_url, ticker, window, interval, Utc::now())?;
        debug!(%url, "requesting chart");

        let resp = self.client.get(url).send().map_err(|e| {
            DataError::NetworkUnreachable(format!("request for {ticker} failed: {e}"))
        })?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(DataError::RateLimited),
            // 404 still carries a chart error body; let the parser classify it.
            s if s.is_success() || s == StatusCode::NOT_FOUND => {}
            s => return Err(DataError::NetworkUnreachable(format!("HTTP {s} for {ticker}"))),
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {ticker}: {e}"))
        })?;

        let mut batch = Self::parse_response(ticker, interval, chart)?;
        if let Some(start) = window.start() {
            batch.retain_from(start);
        }
        Ok(batch)
    }
}
