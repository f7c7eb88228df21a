//! SQLite backend (local file or in-memory).
//!
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text, so ordering by the
//! `date` column is chronological.

use super::{create_table_sql, RowStore, RowWriter, StoreError};
use crate::domain::{BarFields, StoredBar, TableName};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// All rows of a table in ascending timestamp order.
    pub fn rows(&self, table: &TableName) -> Result<Vec<StoredBar>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT date, open, high, low, close, adj_close, volume FROM {} ORDER BY date",
            table.quoted()
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredBar {
                    timestamp: row.get(0)?,
                    fields: BarFields {
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        adj_close: row.get(5)?,
                        volume: row.get(6)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn edge_timestamp(
        &self,
        table: &TableName,
        order: &str,
    ) -> Result<Option<NaiveDateTime>, StoreError> {
        let sql = format!(
            "SELECT date FROM {} ORDER BY date {order} LIMIT 1",
            table.quoted()
        );
        Ok(self.conn.query_row(&sql, [], |row| row.get(0)).optional()?)
    }
}

impl RowStore for SqliteStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    fn ensure_table(&mut self, table: &TableName) -> Result<(), StoreError> {
        self.conn
            .execute_batch(&create_table_sql(table, "TEXT", "REAL", "INTEGER"))?;
        Ok(())
    }

    fn table_exists(&mut self, table: &TableName) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn last_timestamp(&mut self, table: &TableName) -> Result<Option<NaiveDateTime>, StoreError> {
        self.edge_timestamp(table, "DESC")
    }

    fn first_timestamp(
        &mut self,
        table: &TableName,
    ) -> Result<Option<NaiveDateTime>, StoreError> {
        self.edge_timestamp(table, "ASC")
    }

    fn row_count(&mut self, table: &TableName) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.quoted()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn begin(&mut self) -> Result<Box<dyn RowWriter + '_>, StoreError> {
        Ok(Box::new(SqliteWriter {
            tx: self.conn.transaction()?,
        }))
    }
}

struct SqliteWriter<'conn> {
    tx: Transaction<'conn>,
}

impl RowWriter for SqliteWriter<'_> {
    fn exists(&mut self, table: &TableName, timestamp: NaiveDateTime) -> Result<bool, StoreError> {
        let found = self
            .tx
            .query_row(
                &format!("SELECT 1 FROM {} WHERE date = ?1", table.quoted()),
                [timestamp],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn update(
        &mut self,
        table: &TableName,
        timestamp: NaiveDateTime,
        fields: &BarFields,
    ) -> Result<(), StoreError> {
        self.tx.execute(
            &format!(
                "UPDATE {} SET open = ?1, high = ?2, low = ?3, close = ?4, adj_close = ?5, volume = ?6
                 WHERE date = ?7",
                table.quoted()
            ),
            params![
                fields.open,
                fields.high,
                fields.low,
                fields.close,
                fields.adj_close,
                fields.volume,
                timestamp
            ],
        )?;
        Ok(())
    }

    fn insert(
        &mut self,
        table: &TableName,
        timestamp: NaiveDateTime,
        fields: &BarFields,
    ) -> Result<(), StoreError> {
        self.tx.execute(
            &format!(
                "INSERT INTO {} (date, open, high, low, close, adj_close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                table.quoted()
            ),
            params![
                timestamp,
                fields.open,
                fields.high,
                fields.low,
                fields.close,
                fields.adj_close,
                fields.volume
            ],
        )?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }
}
