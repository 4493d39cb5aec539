//! Per-bucket metric sums

use crate::registry::NumericKind;
use serde::{Serialize, Serializer};

/// Decimal places kept on float sums
pub const FLOAT_DECIMALS: i32 = 6;

/// A summed metric value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Exact integer sum
    Integer(i64),
    /// Float sum, or an integer sum that overflowed
    Float(f64),
}

impl MetricValue {
    /// Value as `f64`
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
        }
    }
}

/// Running sum of one metric within one bucket
#[derive(Debug, Clone, Copy)]
pub(crate) enum Accumulator {
    Integer(i64),
    Float(f64),
}

impl Accumulator {
    pub(crate) fn new(kind: NumericKind) -> Self {
        match kind {
            NumericKind::Integer => Self::Integer(0),
            NumericKind::Float => Self::Float(0.0),
        }
    }

    /// Add an integer; an integer sum promotes to float on overflow
    pub(crate) fn add_integer(&mut self, value: i64) {
        *self = match *self {
            Self::Integer(sum) => match sum.checked_add(value) {
                Some(s) => Self::Integer(s),
                None => Self::Float(sum as f64 + value as f64),
            },
            Self::Float(sum) => Self::Float(sum + value as f64),
        };
    }

    pub(crate) fn add_float(&mut self, value: f64) {
        *self = match *self {
            Self::Integer(sum) => Self::Float(sum as f64 + value),
            Self::Float(sum) => Self::Float(sum + value),
        };
    }

    pub(crate) fn finish(self) -> MetricValue {
        match self {
            Self::Integer(sum) => MetricValue::Integer(sum),
            Self::Float(sum) => MetricValue::Float(round_decimals(sum, FLOAT_DECIMALS)),
        }
    }
}

/// Round half away from zero to the given number of decimal places
pub fn round_decimals(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if scaled.is_finite() {
        scaled.round() / factor
    } else {
        value
    }
}
