//! Sync orchestrator: runs one pass per configured (ticker, table, interval).
//!
//! A pass: ensure table → read last timestamp → freshness gate → resolve
//! window → fetch → normalize → trim → reconcile. Passes run sequentially; a
//! failing pass is reported and the run moves on to the next table.

use super::reconcile::reconcile;
use super::window::{self, FetchWindow};
use super::{PassOutcome, PassReport, SyncError, SyncJob, SyncSummary};
use crate::data::normalize::Normalizer;
use crate::data::provider::QuoteSource;
use crate::policy::{self, Decision};
use crate::store::RowStore;
use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};

/// Run every job in order against one store and one source.
///
/// `now` is the exchange-local wall-clock time the policies are evaluated at.
pub fn run_sync(
    source: &dyn QuoteSource,
    store: &mut dyn RowStore,
    jobs: &[SyncJob],
    now: NaiveDateTime,
) -> SyncSummary {
    info!(
        source = source.name(),
        backend = store.backend(),
        passes = jobs.len(),
        "starting sync run"
    );

    let mut reports = Vec::with_capacity(jobs.len());
    for job in jobs {
        let result = sync_pass(source, store, job, now);
        match &result {
            Ok(outcome) => info!(
                table = %job.table,
                interval = %job.interval,
                outcome = %outcome,
                "pass finished"
            ),
            Err(e) => error!(
                table = %job.table,
                interval = %job.interval,
                error = %e,
                "pass failed"
            ),
        }
        reports.push(PassReport {
            job: job.clone(),
            result,
        });
    }

    let summary = SyncSummary { reports };
    info!(
        written = summary.rows_written(),
        skipped = summary.skipped(),
        nothing_new = summary.nothing_new(),
        failed = summary.failed(),
        "sync run complete"
    );
    summary
}

/// One pass for one table.
pub fn sync_pass(
    source: &dyn QuoteSource,
    store: &mut dyn RowStore,
    job: &SyncJob,
    now: NaiveDateTime,
) -> Result<PassOutcome, SyncError> {
    store.ensure_table(&job.table)?;

    // Read fresh every pass; never cached.
    let last_known = store.last_timestamp(&job.table)?;

    let decision = policy::decide(&job.interval, last_known, now);
    debug!(
        table = %job.table,
        interval = %job.interval,
        last_known = ?last_known,
        decision = ?decision,
        "freshness gate"
    );
    if decision == Decision::Skip {
        return Ok(PassOutcome::Skipped { last_known });
    }

    let window = window::resolve(last_known);
    if window == FetchWindow::FullHistory {
        info!(table = %job.table, ticker = %job.ticker, "empty table, fetching full history");
    } else {
        debug!(table = %job.table, window = %window, "incremental fetch");
    }

    let raw = source.fetch(&job.ticker, &window, &job.interval)?;
    if raw.is_empty() {
        warn!(table = %job.table, ticker = %job.ticker, "source returned no rows");
        return Ok(PassOutcome::NothingNew);
    }

    let rows = Normalizer::normalize(&raw);
    let fetched = rows.len();
    let rows = policy::trim(rows, &job.interval, now);
    if rows.len() < fetched {
        warn!(
            table = %job.table,
            dropped = fetched - rows.len(),
            "market still open, provisional bar not stored"
        );
    }
    if rows.is_empty() {
        return Ok(PassOutcome::NothingNew);
    }

    let summary = reconcile(store, &job.table, &rows).map_err(|source| SyncError::Reconcile {
        table: job.table.to_string(),
        source,
    })?;
    Ok(PassOutcome::Written(summary))
}

impl SyncSummary {
    pub fn rows_written(&self) -> usize {
        self.reports
            .iter()
            .filter_map(|r| match &r.result {
                Ok(PassOutcome::Written(s)) => Some(s.written()),
                _ => None,
            })
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, PassOutcome::Skipped { .. }))
    }

    pub fn nothing_new(&self) -> usize {
        self.count(|o| matches!(o, PassOutcome::NothingNew))
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.result.is_err()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&PassOutcome) -> bool) -> usize {
        self.reports
            .iter()
            .filter(|r| r.result.as_ref().is_ok_and(&pred))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::reconcile::ReconcileSummary;
    use crate::data::provider::{ColumnLabel, DataError, RawBatch};
    use crate::domain::{Interval, TableName};
    use crate::store::SqliteStore;
    use crate::sync::reconcile::test_support::FailingStore;
    use chrono::{Duration, NaiveDate};
    use std::cell::RefCell;

    /// Serves a fixed set of daily rows and records every request.
    struct ScriptedSource {
        rows: Vec<(NaiveDateTime, f64)>,
        calls: RefCell<Vec<FetchWindow>>,
        fail: bool,
    }

    impl ScriptedSource {
        fn new(rows: Vec<(NaiveDateTime, f64)>) -> Self {
            Self {
                rows,
                calls: RefCell::new(Vec::new()),
                fail: false,
            }
        }
    }

    impl QuoteSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch(
            &self,
            _ticker: &str,
            window: &FetchWindow,
            _interval: &Interval,
        ) -> Result<RawBatch, DataError> {
            self.calls.borrow_mut().push(*window);
            if self.fail {
                return Err(DataError::NetworkUnreachable("connection refused".into()));
            }
            let rows: Vec<_> = self.rows.iter().filter(|(t, _)| window.admits(*t)).collect();
            Ok(RawBatch::new(rows.iter().map(|(t, _)| *t).collect())
                .with_column(
                    ColumnLabel::new(["Close", "^FCHI"]),
                    rows.iter().map(|(_, c)| Some(*c)).collect(),
                )
                .with_column(
                    ColumnLabel::new(["Volume", "^FCHI"]),
                    rows.iter().map(|_| Some(100.0)).collect(),
                ))
        }
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn job(table: &str, interval: Interval) -> SyncJob {
        SyncJob {
            ticker: "^FCHI".into(),
            table: TableName::new(table).unwrap(),
            interval,
        }
    }

    // Wednesday 2024-03-13 after the close.
    fn evening() -> NaiveDateTime {
        day(13) + Duration::hours(20)
    }

    #[test]
    fn first_pass_fetches_full_history_then_incremental() {
        let source = ScriptedSource::new(vec![(day(11), 1.0), (day(12), 2.0), (day(13), 3.0)]);
        let mut store = SqliteStore::open_in_memory().unwrap();
        let job = job("cac", Interval::Daily);

        let first = sync_pass(&source, &mut store, &job, evening()).unwrap();
        assert_eq!(first, PassOutcome::Written(ReconcileSummary { inserted: 3, updated: 0 }));

        let second = sync_pass(&source, &mut store, &job, evening()).unwrap();
        // The boundary bar is fetched again and overwritten in place.
        assert_eq!(second, PassOutcome::Written(ReconcileSummary { inserted: 0, updated: 1 }));

        let calls = source.calls.borrow();
        assert_eq!(calls[0], FetchWindow::FullHistory);
        assert_eq!(calls[1], FetchWindow::From(day(13)));
        assert_eq!(store.row_count(&job.table).unwrap(), 3);
    }

    #[test]
    fn provisional_daily_bar_is_not_stored_during_session() {
        let source = ScriptedSource::new(vec![(day(12), 2.0), (day(13), 3.0)]);
        let mut store = SqliteStore::open_in_memory().unwrap();
        let job = job("cac", Interval::Daily);

        let midday = day(13) + Duration::hours(15);
        let outcome = sync_pass(&source, &mut store, &job, midday).unwrap();
        assert_eq!(outcome, PassOutcome::Written(ReconcileSummary { inserted: 1, updated: 0 }));
        assert_eq!(store.last_timestamp(&job.table).unwrap(), Some(day(12)));
    }

    #[test]
    fn trimming_everything_means_nothing_new() {
        let source = ScriptedSource::new(vec![(day(13), 3.0)]);
        let mut store = SqliteStore::open_in_memory().unwrap();
        let job = job("cac", Interval::Daily);

        let midday = day(13) + Duration::hours(11);
        let outcome = sync_pass(&source, &mut store, &job, midday).unwrap();
        assert_eq!(outcome, PassOutcome::NothingNew);
        assert_eq!(store.row_count(&job.table).unwrap(), 0);
    }

    #[test]
    fn fresh_hourly_table_skips_without_fetching() {
        let t0 = day(13) + Duration::hours(10);
        let source = ScriptedSource::new(vec![(t0, 1.0)]);
        let mut store = SqliteStore::open_in_memory().unwrap();
        let job = job("cac_hourly", Interval::Hourly);

        sync_pass(&source, &mut store, &job, t0 + Duration::minutes(10)).unwrap();
        let outcome = sync_pass(&source, &mut store, &job, t0 + Duration::minutes(40)).unwrap();
        assert_eq!(outcome, PassOutcome::Skipped { last_known: Some(t0) });
        assert_eq!(source.calls.borrow().len(), 1);
    }

    #[test]
    fn empty_fetch_is_nothing_new() {
        let source = ScriptedSource::new(Vec::new());
        let mut store = SqliteStore::open_in_memory().unwrap();
        let outcome = sync_pass(&source, &mut store, &job("cac", Interval::Daily), evening()).unwrap();
        assert_eq!(outcome, PassOutcome::NothingNew);
    }

    #[test]
    fn empty_fetch_after_existing_rows_writes_nothing() {
        let full = ScriptedSource::new(vec![(day(11), 1.0), (day(12), 2.0)]);
        let mut store = SqliteStore::open_in_memory().unwrap();
        let job = job("cac", Interval::Daily);
        sync_pass(&full, &mut store, &job, evening()).unwrap();

        let empty = ScriptedSource::new(Vec::new());
        let outcome = sync_pass(&empty, &mut store, &job, evening()).unwrap();
        assert_eq!(outcome, PassOutcome::NothingNew);
        assert_eq!(empty.calls.borrow()[0], FetchWindow::From(day(12)));
        assert_eq!(store.row_count(&job.table).unwrap(), 2);
    }

    #[test]
    fn fetch_failure_is_reported_and_run_continues() {
        let mut source = ScriptedSource::new(vec![(day(12), 2.0)]);
        source.fail = true;
        let mut store = SqliteStore::open_in_memory().unwrap();
        let jobs = vec![job("a", Interval::Daily), job("b", Interval::Weekly)];

        let summary = run_sync(&source, &mut store, &jobs, evening());
        assert_eq!(summary.failed(), 2);
        assert!(!summary.all_succeeded());
        assert!(matches!(summary.reports[0].result, Err(SyncError::Fetch(_))));
        assert_eq!(source.calls.borrow().len(), 2);
    }

    #[test]
    fn reconcile_failure_rolls_back_and_next_table_still_syncs() {
        let source = ScriptedSource::new(vec![(day(11), 1.0), (day(12), 2.0)]);
        let inner = SqliteStore::open_in_memory().unwrap();
        // Fails the second write of every pass.
        let mut store = FailingStore { inner, fail_at: 1 };
        let jobs = vec![job("a", Interval::Daily)];

        let summary = run_sync(&source, &mut store, &jobs, evening());
        assert!(matches!(
            &summary.reports[0].result,
            Err(SyncError::Reconcile { table, .. }) if table == "a"
        ));
        assert_eq!(store.inner.row_count(&jobs[0].table).unwrap(), 0);

        store.fail_at = usize::MAX;
        let jobs = vec![job("a", Interval::Daily), job("b", Interval::Daily)];
        let summary = run_sync(&source, &mut store, &jobs, evening());
        assert!(summary.all_succeeded());
        assert_eq!(summary.rows_written(), 4);
    }

    #[test]
    fn summary_counts_outcomes() {
        let t0 = day(13) + Duration::hours(10);
        let source = ScriptedSource::new(vec![(t0, 1.0)]);
        let mut store = SqliteStore::open_in_memory().unwrap();
        let jobs = vec![job("h", Interval::Hourly), job("w", Interval::Weekly)];

        let summary = run_sync(&source, &mut store, &jobs, t0 + Duration::minutes(20));
        assert_eq!(summary.rows_written(), 2);

        // Hourly bar is under an hour old; weekly is still in the same week.
        let summary = run_sync(&source, &mut store, &jobs, t0 + Duration::minutes(30));
        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.nothing_new(), 0);
        assert_eq!(summary.rows_written(), 0);
    }
}
