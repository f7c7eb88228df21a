//! Row storage: one relational table per (ticker, interval) pair.
//!
//! Schema (both backends):
//!
//! | column    | type                 |
//! |-----------|----------------------|
//! | date      | timestamp, PK        |
//! | open      | float                |
//! | high      | float                |
//! | low       | float                |
//! | close     | float                |
//! | adj_close | float                |
//! | volume    | bigint, nullable     |
//!
//! Writes go through a [`RowWriter`] obtained from [`RowStore::begin`]. A writer
//! wraps one storage transaction: nothing is visible until `commit`, and
//! dropping the writer without committing rolls everything back.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;

use crate::config::StorageTarget;
use crate::domain::{BarFields, TableName};
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("postgres: {0}")]
    Postgres(#[from] ::postgres::Error),
}

/// Table-level storage operations.
pub trait RowStore {
    /// Backend name (for logging).
    fn backend(&self) -> &str;

    /// Create the table if it does not exist. Idempotent.
    fn ensure_table(&mut self, table: &TableName) -> Result<(), StoreError>;

    fn table_exists(&mut self, table: &TableName) -> Result<bool, StoreError>;

    /// Most recent stored timestamp, `None` for an empty table.
    fn last_timestamp(&mut self, table: &TableName) -> Result<Option<NaiveDateTime>, StoreError>;

    /// Oldest stored timestamp, `None` for an empty table.
    fn first_timestamp(&mut self, table: &TableName)
        -> Result<Option<NaiveDateTime>, StoreError>;

    fn row_count(&mut self, table: &TableName) -> Result<u64, StoreError>;

    /// Open a write transaction.
    fn begin(&mut self) -> Result<Box<dyn RowWriter + '_>, StoreError>;
}

/// Row-level operations inside one transaction.
pub trait RowWriter {
    fn exists(&mut self, table: &TableName, timestamp: NaiveDateTime) -> Result<bool, StoreError>;

    /// Overwrite every non-key column of the row at `timestamp`.
    fn update(
        &mut self,
        table: &TableName,
        timestamp: NaiveDateTime,
        fields: &BarFields,
    ) -> Result<(), StoreError>;

    fn insert(
        &mut self,
        table: &TableName,
        timestamp: NaiveDateTime,
        fields: &BarFields,
    ) -> Result<(), StoreError>;

    /// Make every write of this transaction durable.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Open the store described by the configuration.
pub fn open_store(target: &StorageTarget) -> Result<Box<dyn RowStore>, StoreError> {
    match target {
        StorageTarget::Postgres(db) => Ok(Box::new(PostgresStore::connect(db)?)),
        StorageTarget::Sqlite(path) => Ok(Box::new(SqliteStore::open(path)?)),
    }
}

/// DDL shared by both backends; only the column types differ.
pub(crate) fn create_table_sql(table: &TableName, ts_type: &str, float_type: &str, int_type: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            date {ts_type} PRIMARY KEY,
            open {float_type},
            high {float_type},
            low {float_type},
            close {float_type},
            adj_close {float_type},
            volume {int_type}
        )",
        table.quoted()
    )
}
