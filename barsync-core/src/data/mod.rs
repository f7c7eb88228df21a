//! Quote sources and bar normalization.

pub mod csv_source;
pub mod normalize;
pub mod provider;
pub mod yahoo;

pub use csv_source::CsvSource;
pub use normalize::Normalizer;
pub use provider::{ColumnLabel, DataError, QuoteSource, RawBatch, RawColumn};
pub use yahoo::YahooSource;
