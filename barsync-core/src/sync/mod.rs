//! Incremental synchronization: window resolution, reconciliation and the
//! per-table pass orchestrator.

pub mod orchestrator;
pub mod reconcile;
pub mod window;

pub use orchestrator::{run_sync, sync_pass};
pub use reconcile::{reconcile, ReconcileSummary};
pub use window::FetchWindow;

use crate::data::provider::DataError;
use crate::domain::{Interval, TableName};
use crate::store::StoreError;
use chrono::NaiveDateTime;
use std::fmt;
use thiserror::Error;

/// One configured sync target: which ticker lands in which table, at which
/// interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub ticker: String,
    pub table: TableName,
    pub interval: Interval,
}

/// Why a pass failed. A failed pass never leaves partial writes behind.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] DataError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("reconcile into '{table}' rolled back: {source}")]
    Reconcile {
        table: String,
        #[source]
        source: StoreError,
    },
}

/// Result of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Freshness gate decided the stored data is current.
    Skipped { last_known: Option<NaiveDateTime> },
    /// Source had nothing to write (empty fetch, or only a provisional bar).
    NothingNew,
    Written(ReconcileSummary),
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { last_known: Some(t) } => write!(f, "skipped (up to date at {t})"),
            Self::Skipped { last_known: None } => f.write_str("skipped"),
            Self::NothingNew => f.write_str("nothing new"),
            Self::Written(s) => write!(f, "{} inserted, {} updated", s.inserted, s.updated),
        }
    }
}

#[derive(Debug)]
pub struct PassReport {
    pub job: SyncJob,
    pub result: Result<PassOutcome, SyncError>,
}

/// Reports of every pass in a run, in job order.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub reports: Vec<PassReport>,
}
