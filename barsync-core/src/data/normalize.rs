//! Bar normalizer: raw batch → canonical bars.
//!
//! Field names are matched after collapsing multi-level labels to their first
//! level, lower-casing and replacing spaces with underscores, so `"Adj Close"`,
//! `("Adj Close", "^FCHI")` and `"adj_close"` all address the same field.
//!
//! Missing prices become 0.0 rather than an error or a null. Volume is passed
//! through untouched; the NULL rule for volume is applied at write time
//! ([`Bar::stored_volume`]).

use super::provider::RawBatch;
use crate::domain::Bar;
use std::collections::HashMap;

const OPEN: &str = "open";
const HIGH: &str = "high";
const LOW: &str = "low";
const CLOSE: &str = "close";
const ADJ_CLOSE: &[&str] = &["adj_close", "adjusted_close"];
const VOLUME: &str = "volume";

/// Canonical field name for a raw primary label.
pub fn field_name(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

/// Normalizer for raw batches.
pub struct Normalizer;

impl Normalizer {
    /// Normalize a raw batch into bars in ascending timestamp order, one bar per
    /// source observation. An empty batch yields an empty vector.
    pub fn normalize(raw: &RawBatch) -> Vec<Bar> {
        if raw.is_empty() {
            return Vec::new();
        }

        // First column wins when several collapse onto the same field name.
        let mut by_field: HashMap<String, &[Option<f64>]> = HashMap::new();
        for column in &raw.columns {
            by_field
                .entry(field_name(column.label.primary()))
                .or_insert(column.values.as_slice());
        }

        let value = |field: &str, i: usize| -> Option<f64> {
            by_field.get(field).and_then(|v| v.get(i).copied().flatten())
        };
        let price = |field: &str, i: usize| -> f64 {
            value(field, i).filter(|v| !v.is_nan()).unwrap_or(0.0)
        };
        let adj_field = ADJ_CLOSE
            .iter()
            .copied()
            .find(|f| by_field.contains_key(*f))
            .unwrap_or(ADJ_CLOSE[0]);

        let mut bars: Vec<Bar> = raw
            .index
            .iter()
            .enumerate()
            .map(|(i, &timestamp)| Bar {
                timestamp,
                open: price(OPEN, i),
                high: price(HIGH, i),
                low: price(LOW, i),
                close: price(CLOSE, i),
                adj_close: price(adj_field, i),
                volume: value(VOLUME, i),
            })
            .collect();

        // Stable: equal timestamps keep source order.
        bars.sort_by_key(|b| b.timestamp);
        bars
    }
}
