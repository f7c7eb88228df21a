//! barsync core: incremental market-bar synchronization.
//!
//! This crate contains every engine component:
//! - Domain types (bars, intervals, table names)
//! - Quote sources (Yahoo Finance chart API, CSV exports) and the normalizer
//! - Interval policies: freshness gate and provisional-bar trimming
//! - Row stores (PostgreSQL, SQLite) with one transaction per pass
//! - Window resolution, upsert reconciliation and the pass orchestrator
//! - Configuration (TOML file plus database credentials from the environment)

pub mod config;
pub mod data;
pub mod domain;
pub mod policy;
pub mod store;
pub mod sync;
