//! PostgreSQL backend over a single synchronous connection.

use super::{create_table_sql, RowStore, RowWriter, StoreError};
use crate::config::DatabaseConfig;
use crate::domain::{BarFields, TableName};
use chrono::NaiveDateTime;
use postgres::{Client, NoTls, Transaction};

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    pub fn connect(db: &DatabaseConfig) -> Result<Self, StoreError> {
        let client = connection_config(db).connect(NoTls)?;
        Ok(Self { client })
    }

    fn edge_timestamp(
        &mut self,
        table: &TableName,
        order: &str,
    ) -> Result<Option<NaiveDateTime>, StoreError> {
        let sql = format!(
            "SELECT \"date\" FROM {} ORDER BY \"date\" {order} LIMIT 1",
            table.quoted()
        );
        let row = self.client.query_opt(sql.as_str(), &[])?;
        Ok(row.map(|r| r.get(0)))
    }
}

pub(crate) fn connection_config(db: &DatabaseConfig) -> postgres::Config {
    let mut config = postgres::Config::new();
    config
        .host(&db.host)
        .port(db.port)
        .user(&db.user)
        .password(&db.password)
        .dbname(&db.dbname)
        .application_name("barsync");
    config
}

impl RowStore for PostgresStore {
    fn backend(&self) -> &str {
        "postgres"
    }

    fn ensure_table(&mut self, table: &TableName) -> Result<(), StoreError> {
        self.client
            .batch_execute(&create_table_sql(table, "TIMESTAMP", "FLOAT", "BIGINT"))?;
        Ok(())
    }

    fn table_exists(&mut self, table: &TableName) -> Result<bool, StoreError> {
        let row = self.client.query_one(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )",
            &[&table.as_str()],
        )?;
        Ok(row.get(0))
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
        let sql = format!("SELECT COUNT(*) FROM {}", table.quoted());
        let row = self.client.query_one(sql.as_str(), &[])?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    fn begin(&mut self) -> Result<Box<dyn RowWriter + '_>, StoreError> {
        Ok(Box::new(PostgresWriter {
            tx: self.client.transaction()?,
        }))
    }
}

struct PostgresWriter<'client> {
    tx: Transaction<'client>,
}

impl RowWriter for PostgresWriter<'_> {
    fn exists(&mut self, table: &TableName, timestamp: NaiveDateTime) -> Result<bool, StoreError> {
        let sql = format!("SELECT 1 FROM {} WHERE \"date\" = $1", table.quoted());
        Ok(self.tx.query_opt(sql.as_str(), &[&timestamp])?.is_some())
    }

    fn update(
        &mut self,
        table: &TableName,
        timestamp: NaiveDateTime,
        fields: &BarFields,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE {} SET open = $1, high = $2, low = $3, close = $4, adj_close = $5, volume = $6
             WHERE \"date\" = $7",
            table.quoted()
        );
        self.tx.execute(
            sql.as_str(),
            &[
                &fields.open,
                &fields.high,
                &fields.low,
                &fields.close,
                &fields.adj_close,
                &fields.volume,
                &timestamp,
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
        let sql = format!(
            "INSERT INTO {} (\"date\", open, high, low, close, adj_close, volume)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            table.quoted()
        );
        self.tx.execute(
            sql.as_str(),
            &[
                &timestamp,
                &fields.open,
                &fields.high,
                &fields.low,
                &fields.close,
                &fields.adj_close,
                &fields.volume,
            ],
        )?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }
}
