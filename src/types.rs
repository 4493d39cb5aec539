//! Core data types shared across the service
//!
//! # Key Types
//!
//! - **`FieldKind`**: Declared type of a dataset column
//! - **`FieldValue`**: A typed cell value
//! - **`Row`**: One record of a dataset, keyed by field name
//!
//! Rows are schema-agnostic containers. The dataset descriptor decides which
//! fields must be present and how they are read.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use vision_analytics::types::{FieldValue, Row};
//!
//! let row = Row::new()
//!     .with("id", FieldValue::Integer(1))
//!     .with("date", FieldValue::Date(NaiveDate::from_ymd_opt(2021, 1, 15).unwrap()))
//!     .with("expenses", FieldValue::Float(100.0));
//!
//! assert_eq!(row.get("expenses").and_then(FieldValue::as_f64), Some(100.0));
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Wire format for dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire format for date-times
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Declared type of a dataset field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Signed 64-bit integer
    Integer,
    /// 64-bit float
    Float,
    /// UTF-8 string
    Text,
    /// Calendar date
    Date,
    /// Date and time without time zone
    DateTime,
}

impl FieldKind {
    /// Integer or float
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Date or datetime
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::DateTime)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Date => "date",
            Self::DateTime => "datetime",
        };
        f.write_str(s)
    }
}

/// A single typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent value
    Null,
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// Calendar date
    Date(NaiveDate),
    /// Date and time
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// Kind of this value, `None` for null
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(FieldKind::Integer),
            Self::Float(_) => Some(FieldKind::Float),
            Self::Text(_) => Some(FieldKind::Text),
            Self::Date(_) => Some(FieldKind::Date),
            Self::DateTime(_) => Some(FieldKind::DateTime),
        }
    }

    /// Calendar date of a date or datetime value
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    /// Integer value, without coercion
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Decode a JSON value as the given kind
    ///
    /// JSON `null` always decodes to [`FieldValue::Null`]. Integers are
    /// accepted for float fields; floats are never narrowed to integers.
    pub fn decode(kind: FieldKind, value: &JsonValue) -> Result<Self, String> {
        if value.is_null() {
            return Ok(Self::Null);
        }
        let decoded = match kind {
            FieldKind::Integer => value.as_i64().map(Self::Integer),
            FieldKind::Float => value.as_f64().map(Self::Float),
            FieldKind::Text => value.as_str().map(|s| Self::Text(s.to_string())),
            FieldKind::Date => value.as_str().and_then(parse_date).map(Self::Date),
            FieldKind::DateTime => value.as_str().and_then(parse_date_time).map(Self::DateTime),
        };
        decoded.ok_or_else(|| format!("expected {}, got {}", kind, value))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATE_TIME_FORMAT)),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Date(_) | Self::DateTime(_) => serializer.collect_str(self),
        }
    }
}

/// Parse `YYYY-MM-DD`, also accepting a date-time and keeping its date
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| parse_date_time(s).map(|dt| dt.date()))
}

/// Parse a date-time in ISO or space-separated form; a bare date means midnight
pub fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// One record of a dataset
///
/// Serializes as a JSON object with fields in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(BTreeMap<String, FieldValue>);

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.insert(field, value);
        self
    }

    /// Set a field, returning the previous value
    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.0.insert(field.into(), value)
    }

    /// Get a field by name
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// Whether the row carries the field
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Integer `id` field, if present
    pub fn id(&self) -> Option<i64> {
        self.get("id").and_then(FieldValue::as_i64)
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_kinds() {
        assert_eq!(
            FieldValue::decode(FieldKind::Integer, &json!(42)).unwrap(),
            FieldValue::Integer(42)
        );
        assert_eq!(
            FieldValue::decode(FieldKind::Float, &json!(3)).unwrap(),
            FieldValue::Float(3.0)
        );
        assert_eq!(
            FieldValue::decode(FieldKind::Date, &json!("2021-01-15")).unwrap(),
            FieldValue::Date(NaiveDate::from_ymd_opt(2021, 1, 15).unwrap())
        );
        assert_eq!(
            FieldValue::decode(FieldKind::Text, &json!(null)).unwrap(),
            FieldValue::Null
        );
    }

    #[test]
    fn test_decode_rejects_narrowing() {
        assert!(FieldValue::decode(FieldKind::Integer, &json!(1.5)).is_err());
        assert!(FieldValue::decode(FieldKind::Date, &json!(20210115)).is_err());
        assert!(FieldValue::decode(FieldKind::Date, &json!("15/01/2021")).is_err());
    }

    #[test]
    fn test_parse_date_time_forms() {
        let expected = NaiveDate::from_ymd_opt(2020, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(parse_date_time("2020-03-01T12:30:00"), Some(expected));
        assert_eq!(parse_date_time("2020-03-01 12:30:00"), Some(expected));
        assert_eq!(
            parse_date("2020-03-01 12:30:00"),
            NaiveDate::from_ymd_opt(2020, 3, 1)
        );
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = Row::new()
            .with("id", FieldValue::Integer(7))
            .with(
                "date",
                FieldValue::Date(NaiveDate::from_ymd_opt(2020, 2, 29).unwrap()),
            )
            .with("note", FieldValue::Null);
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value, json!({"id": 7, "date": "2020-02-29", "note": null}));
        assert_eq!(row.id(), Some(7));
    }
}
