//! Reconciler: row-level upsert of normalized bars into one table.

use crate::domain::{Bar, TableName};
use crate::store::{RowStore, StoreError};
use serde::Serialize;

/// Rows written by one reconcile call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl ReconcileSummary {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Upsert `rows` into `table` inside one transaction.
///
/// A row whose timestamp already exists has all its non-key columns
/// overwritten; any other row is inserted. Nothing is committed unless every
/// row succeeds: the first failing row aborts the call and the open
/// transaction is rolled back when the writer is dropped.
pub fn reconcile(
    store: &mut dyn RowStore,
    table: &TableName,
    rows: &[Bar],
) -> Result<ReconcileSummary, StoreError> {
    let mut summary = ReconcileSummary::default();
    let mut writer = store.begin()?;

    for row in rows {
        let fields = row.fields();
        if writer.exists(table, row.timestamp)? {
            writer.update(table, row.timestamp, &fields)?;
            summary.updated += 1;
        } else {
            writer.insert(table, row.timestamp, &fields)?;
            summary.inserted += 1;
        }
    }

    writer.commit()?;
    Ok(summary)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A store wrapper that fails the n-th write, for rollback tests.

    use crate::domain::{BarFields, TableName};
    use crate::store::{RowStore, RowWriter, StoreError};
    use chrono::NaiveDateTime;

    pub struct FailingStore<S> {
        pub inner: S,
        /// Zero-based index of the write (insert or update) that fails.
        pub fail_at: usize,
    }

    struct FailingWriter<'a> {
        inner: Box<dyn RowWriter + 'a>,
        writes: usize,
        fail_at: usize,
    }

    impl FailingWriter<'_> {
        fn tick(&mut self) -> Result<(), StoreError> {
            let n = self.writes;
            self.writes += 1;
            if n == self.fail_at {
                Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
            } else {
                Ok(())
            }
        }
    }

    impl RowWriter for FailingWriter<'_> {
        fn exists(&mut self, table: &TableName, ts: NaiveDateTime) -> Result<bool, StoreError> {
            self.inner.exists(table, ts)
        }

        fn update(
            &mut self,
            table: &TableName,
            ts: NaiveDateTime,
            fields: &BarFields,
        ) -> Result<(), StoreError> {
            self.tick()?;
            self.inner.update(table, ts, fields)
        }

        fn insert(
            &mut self,
            table: &TableName,
            ts: NaiveDateTime,
            fields: &BarFields,
        ) -> Result<(), StoreError> {
            self.tick()?;
            self.inner.insert(table, ts, fields)
        }

        fn commit(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.commit()
        }
    }

    impl<S: RowStore> RowStore for FailingStore<S> {
        fn backend(&self) -> &str {
            "failing"
        }

        fn ensure_table(&mut self, table: &TableName) -> Result<(), StoreError> {
            self.inner.ensure_table(table)
        }

        fn table_exists(&mut self, table: &TableName) -> Result<bool, StoreError> {
            self.inner.table_exists(table)
        }

        fn last_timestamp(
            &mut self,
            table: &TableName,
        ) -> Result<Option<NaiveDateTime>, StoreError> {
            self.inner.last_timestamp(table)
        }

        fn first_timestamp(
            &mut self,
            table: &TableName,
        ) -> Result<Option<NaiveDateTime>, StoreError> {
            self.inner.first_timestamp(table)
        }

        fn row_count(&mut self, table: &TableName) -> Result<u64, StoreError> {
            self.inner.row_count(table)
        }

        fn begin(&mut self) -> Result<Box<dyn RowWriter + '_>, StoreError> {
            let fail_at = self.fail_at;
            Ok(Box::new(FailingWriter {
                inner: self.inner.begin()?,
                writes: 0,
                fail_at,
            }))
        }
    }
}
