//! Domain types for barsync

pub mod bar;
pub mod interval;
pub mod table;

pub use bar::{Bar, BarFields, StoredBar};
pub use interval::Interval;
pub use table::{InvalidTableName, TableName};
