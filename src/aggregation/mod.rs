//! Time-Bucketed Aggregation
//!
//! Partitions the rows of one dataset by calendar bucket and sums each
//! declared metric per bucket. The dataset descriptor supplies everything
//! schema-specific: which field carries the date, which fields are summed,
//! their numeric kinds and their output labels.
//!
//! ```text
//! rows ──► date_of(row) ──► bucket(date, g) ──► BTreeMap<BucketKey, [Accumulator]>
//!                                                          │
//!                       [{ "Date": label, <label>: sum, ... }] ◄──┘
//! ```
//!
//! Integer metrics sum exactly as `i64` and only become floats on overflow.
//! Float metrics sum as `f64` and are rounded to six decimals on output.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use vision_analytics::aggregation::aggregate;
//! use vision_analytics::calendar::Granularity;
//! use vision_analytics::registry::DatasetRegistry;
//! use vision_analytics::types::{FieldValue, Row};
//!
//! let registry = DatasetRegistry::builtin();
//! let bar = registry.resolve("bar_revenue").unwrap();
//! let rows = vec![Row::new()
//!     .with("date", FieldValue::Date(NaiveDate::from_ymd_opt(2021, 1, 15).unwrap()))
//!     .with("expenses", FieldValue::Float(100.0))
//!     .with("net_income", FieldValue::Float(40.0))];
//!
//! let results = aggregate(&rows, bar, Granularity::Month).unwrap();
//! assert_eq!(results[0].date(), "2021-01");
//! assert_eq!(results[0].get("Revenue").map(|v| v.as_f64()), Some(100.0));
//! ```

mod accumulator;

pub use accumulator::{round_decimals, MetricValue, FLOAT_DECIMALS};

use crate::calendar::{self, BucketKey, Granularity};
use crate::error::{AnalyticsError, Result};
use crate::registry::{DatasetDescriptor, MetricField, NumericKind};
use crate::types::{FieldValue, Row};
use accumulator::Accumulator;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// Results
// ============================================================================

/// One aggregated bucket
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    key: BucketKey,
    date: String,
    metrics: Vec<(String, MetricValue)>,
}

impl AggregationResult {
    /// Bucket this result summarizes
    pub fn key(&self) -> BucketKey {
        self.key
    }

    /// Display label of the bucket
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Summed value for an output label
    pub fn get(&self, label: &str) -> Option<MetricValue> {
        self.metrics
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| *v)
    }

    /// All sums in descriptor order
    pub fn metrics(&self) -> &[(String, MetricValue)] {
        &self.metrics
    }
}

impl Serialize for AggregationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metrics.len() + 1))?;
        map.serialize_entry("Date", &self.date)?;
        for (label, value) in &self.metrics {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Bucket and sum rows at the given granularity
///
/// Buckets are returned in key order. A bucket exists only if at least one
/// row fell into it.
///
/// # Errors
///
/// - `UnsupportedOperation` if the descriptor has no date field
/// - `SchemaMismatch` if a row lacks the date or a metric field, or holds a
///   value that does not match the declared kind
pub fn aggregate(
    rows: &[Row],
    descriptor: &DatasetDescriptor,
    granularity: Granularity,
) -> Result<Vec<AggregationResult>> {
    if descriptor.date_field().is_none() {
        return Err(AnalyticsError::UnsupportedOperation {
            dataset: descriptor.name().to_string(),
            operation: "calendar grouping",
        });
    }

    let metrics = descriptor.metrics();
    let mut buckets: BTreeMap<BucketKey, Vec<Accumulator>> = BTreeMap::new();

    for row in rows {
        let key = calendar::bucket(descriptor.date_of(row)?, granularity);
        let sums = buckets
            .entry(key)
            .or_insert_with(|| metrics.iter().map(|m| Accumulator::new(m.kind())).collect());
        for (metric, sum) in metrics.iter().zip(sums.iter_mut()) {
            add_metric(descriptor, metric, row, sum)?;
        }
    }

    Ok(buckets
        .into_iter()
        .map(|(key, sums)| AggregationResult {
            key,
            date: calendar::label(&key),
            metrics: metrics
                .iter()
                .zip(sums)
                .map(|(m, s)| (m.label().to_string(), s.finish()))
                .collect(),
        })
        .collect())
}

/// Same as [`aggregate`], parsing the granularity first
pub fn aggregate_by(
    rows: &[Row],
    descriptor: &DatasetDescriptor,
    granularity: &str,
) -> Result<Vec<AggregationResult>> {
    aggregate(rows, descriptor, granularity.parse()?)
}

fn add_metric(
    descriptor: &DatasetDescriptor,
    metric: &MetricField,
    row: &Row,
    sum: &mut Accumulator,
) -> Result<()> {
    match (metric.kind(), row.get(metric.field())) {
        (_, Some(FieldValue::Integer(i))) => sum.add_integer(*i),
        (NumericKind::Float, Some(FieldValue::Float(f))) => sum.add_float(*f),
        (_, Some(other)) => {
            return Err(AnalyticsError::schema_mismatch(
                descriptor.name(),
                format!(
                    "metric {} expects {}, found {}",
                    metric.field(),
                    expected_kind(metric.kind()),
                    describe(other)
                ),
            ))
        },
        (_, None) => {
            return Err(AnalyticsError::schema_mismatch(
                descriptor.name(),
                format!("row is missing metric field {}", metric.field()),
            ))
        },
    }
    Ok(())
}

fn expected_kind(kind: NumericKind) -> &'static str {
    match kind {
        NumericKind::Integer => "an integer",
        NumericKind::Float => "a number",
    }
}

fn describe(value: &FieldValue) -> String {
    match value.kind() {
        Some(kind) => format!("{} {}", kind, value),
        None => "null".to_string(),
    }
}
