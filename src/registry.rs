//! Dataset descriptor registry
//!
//! A descriptor declares the schema of one dataset: its field kinds, which
//! field carries the date, which numeric fields are summed (and under which
//! output label), and which field feeds the forecast series. Descriptors are
//! validated once when registered; after startup the registry is shared
//! read-only behind an `Arc`.

use crate::error::{AnalyticsError, RegistryError};
use crate::types::{FieldKind, FieldValue, Row};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;

/// Name and kind of one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as it appears on rows
    pub name: String,
    /// Declared kind
    pub kind: FieldKind,
}

/// A metric as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Source field
    pub field: String,
    /// Output label in aggregation results
    pub label: String,
}

/// Unvalidated dataset description, as built in code or read from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDefinition {
    /// Display name of the backing table; the lowercase form is the dataset name
    pub table: String,
    /// Declared schema
    pub fields: Vec<FieldSpec>,
    /// Field holding the record date
    #[serde(default)]
    pub date_field: Option<String>,
    /// Fields summed per bucket
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    /// Field used as the forecast series
    #[serde(default)]
    pub forecast_field: Option<String>,
}

impl DatasetDefinition {
    /// Start a definition for the given table
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            date_field: None,
            metrics: Vec::new(),
            forecast_field: None,
        }
    }

    /// Declare a field
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
        });
        self
    }

    /// Set the date field
    pub fn date(mut self, field: impl Into<String>) -> Self {
        self.date_field = Some(field.into());
        self
    }

    /// Add a summed metric
    pub fn metric(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
        self.metrics.push(MetricDefinition {
            field: field.into(),
            label: label.into(),
        });
        self
    }

    /// Set the forecast series field
    pub fn forecast(mut self, field: impl Into<String>) -> Self {
        self.forecast_field = Some(field.into());
        self
    }
}

/// Numeric kind of a metric, fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    /// Summed exactly as integers
    Integer,
    /// Summed as floats
    Float,
}

/// A validated metric field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricField {
    field: String,
    label: String,
    kind: NumericKind,
}

impl MetricField {
    /// Source field name
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Output label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Declared numeric kind
    pub fn kind(&self) -> NumericKind {
        self.kind
    }
}

/// A validated dataset descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    name: String,
    table: String,
    fields: Vec<FieldSpec>,
    date_field: Option<String>,
    metrics: Vec<MetricField>,
    forecast_field: Option<String>,
}

impl DatasetDescriptor {
    /// Validate a definition
    ///
    /// The date field must be declared as a date or datetime, metric and
    /// forecast fields must be declared numeric, and metrics require a date
    /// field to bucket by.
    pub fn from_definition(def: DatasetDefinition) -> Result<Self, RegistryError> {
        let table = def.table.trim().to_string();
        if table.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let name = table.to_lowercase();
        let kind_of = |field: &str| -> Result<FieldKind, RegistryError> {
            def.fields
                .iter()
                .find(|f| f.name == field)
                .map(|f| f.kind)
                .ok_or_else(|| RegistryError::UnknownField {
                    dataset: name.clone(),
                    field: field.to_string(),
                })
        };

        if let Some(date_field) = &def.date_field {
            if !kind_of(date_field)?.is_temporal() {
                return Err(RegistryError::NotTemporal {
                    dataset: name.clone(),
                    field: date_field.clone(),
                });
            }
        } else if !def.metrics.is_empty() {
            return Err(RegistryError::MetricsWithoutDate(name));
        }

        let numeric = |field: &str| -> Result<NumericKind, RegistryError> {
            match kind_of(field)? {
                FieldKind::Integer => Ok(NumericKind::Integer),
                FieldKind::Float => Ok(NumericKind::Float),
                _ => Err(RegistryError::NotNumeric {
                    dataset: name.clone(),
                    field: field.to_string(),
                }),
            }
        };

        let metrics = def
            .metrics
            .iter()
            .map(|m| {
                Ok(MetricField {
                    field: m.field.clone(),
                    label: m.label.clone(),
                    kind: numeric(&m.field)?,
                })
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;

        if let Some(forecast_field) = &def.forecast_field {
            numeric(forecast_field)?;
            if def.date_field.is_none() {
                return Err(RegistryError::MetricsWithoutDate(name));
            }
        }

        Ok(Self {
            name,
            table,
            fields: def.fields,
            date_field: def.date_field,
            metrics,
            forecast_field: def.forecast_field,
        })
    }

    /// Canonical lowercase name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name of the backing table
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Declared schema
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Date field, if the dataset is time-stamped
    pub fn date_field(&self) -> Option<&str> {
        self.date_field.as_deref()
    }

    /// Summed metrics in declaration order
    pub fn metrics(&self) -> &[MetricField] {
        &self.metrics
    }

    /// Forecast series field
    pub fn forecast_field(&self) -> Option<&str> {
        self.forecast_field.as_deref()
    }

    /// Declared kind of a field
    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == field).map(|f| f.kind)
    }

    /// Chart datasets carry an underscore in their table name
    pub fn is_chart(&self) -> bool {
        self.table.contains('_')
    }

    /// Read the record date of a row
    pub fn date_of(&self, row: &Row) -> Result<NaiveDate, AnalyticsError> {
        let field = self
            .date_field()
            .ok_or_else(|| AnalyticsError::UnsupportedOperation {
                dataset: self.name.clone(),
                operation: "calendar grouping",
            })?;
        match row.get(field) {
            Some(value) => value.as_date().ok_or_else(|| {
                AnalyticsError::schema_mismatch(
                    &self.name,
                    format!("field {} holds {} instead of a date", field, value),
                )
            }),
            None => Err(AnalyticsError::schema_mismatch(
                &self.name,
                format!("row is missing date field {}", field),
            )),
        }
    }

    /// Read a numeric field as `f64`
    pub fn number_of(&self, row: &Row, field: &str) -> Result<f64, AnalyticsError> {
        match row.get(field) {
            Some(value) => value.as_f64().ok_or_else(|| {
                AnalyticsError::schema_mismatch(
                    &self.name,
                    format!("field {} holds non-numeric value {}", field, value),
                )
            }),
            None => Err(AnalyticsError::schema_mismatch(
                &self.name,
                format!("row is missing field {}", field),
            )),
        }
    }

    /// Decode a JSON object into a row of this dataset
    ///
    /// Unknown fields are rejected. Declared fields that are absent decode as
    /// null, except for the date and metric fields, which are required.
    pub fn decode_row(&self, object: &JsonMap<String, JsonValue>) -> Result<Row, AnalyticsError> {
        if let Some(unknown) = object.keys().find(|k| self.field_kind(k).is_none()) {
            return Err(AnalyticsError::schema_mismatch(
                &self.name,
                format!("unknown field {}", unknown),
            ));
        }
        let mut row = Row::new();
        for spec in &self.fields {
            let value = match object.get(&spec.name) {
                Some(v) => FieldValue::decode(spec.kind, v).map_err(|e| {
                    let detail = format!("field {}: {}", spec.name, e);
                    AnalyticsError::schema_mismatch(&self.name, detail)
                })?,
                None => FieldValue::Null,
            };
            if value == FieldValue::Null && self.is_required(&spec.name) {
                return Err(AnalyticsError::schema_mismatch(
                    &self.name,
                    format!("missing required field {}", spec.name),
                ));
            }
            row.insert(spec.name.clone(), value);
        }
        Ok(row)
    }

    fn is_required(&self, field: &str) -> bool {
        self.date_field() == Some(field) || self.metrics.iter().any(|m| m.field == field)
    }
}

/// Registry of dataset descriptors, keyed by canonical name
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    datasets: Vec<Arc<DatasetDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl DatasetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the dashboard's built-in datasets
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for def in builtin_definitions() {
            // Built-in definitions are fixed and distinct
            if let Err(e) = registry.register(def) {
                tracing::error!(error = %e, "Rejected built-in dataset definition");
            }
        }
        registry
    }

    /// Validate and add a dataset
    pub fn register(&mut self, def: DatasetDefinition) -> Result<(), RegistryError> {
        let descriptor = DatasetDescriptor::from_definition(def)?;
        if self.by_name.contains_key(descriptor.name()) {
            return Err(RegistryError::Duplicate(descriptor.name().to_string()));
        }
        self.by_name
            .insert(descriptor.name().to_string(), self.datasets.len());
        self.datasets.push(Arc::new(descriptor));
        Ok(())
    }

    /// Look up a dataset, ignoring case
    pub fn resolve(&self, name: &str) -> Result<&DatasetDescriptor, AnalyticsError> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&i| self.datasets[i].as_ref())
            .ok_or_else(|| AnalyticsError::NotFound(name.to_string()))
    }

    /// Iterate descriptors in registration order
    pub fn iter(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.iter().map(AsRef::as_ref)
    }

    /// Number of registered datasets
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Tables listed on the dashboard: chart tables plus `Transaction`
    pub fn dashboard_tables(&self) -> Vec<&str> {
        self.iter()
            .filter(|d| d.is_chart() || d.table() == "Transaction")
            .map(DatasetDescriptor::table)
            .collect()
    }

    /// Tables listed in the side navigation: plain entity tables
    pub fn sidenav_tables(&self) -> Vec<&str> {
        self.iter()
            .filter(|d| !d.is_chart())
            .map(DatasetDescriptor::table)
            .collect()
    }
}

fn builtin_definitions() -> Vec<DatasetDefinition> {
    use FieldKind::*;

    let revenue_chart = |table: &str| {
        DatasetDefinition::new(table)
            .field("id", Integer)
            .field("date", Date)
            .field("expenses", Float)
            .field("net_income", Float)
            .date("date")
            .metric("expenses", "Revenue")
            .metric("net_income", "Net_income")
            .forecast("expenses")
    };
    let production_chart = |table: &str| {
        DatasetDefinition::new(table)
            .field("id", Integer)
            .field("date", Date)
            .field("production", Integer)
            .date("date")
            .metric("production", "Production")
    };

    vec![
        revenue_chart("Bar_Revenue"),
        production_chart("Pie_Production"),
        production_chart("Radar_Production"),
        revenue_chart("Scatter_Revenue"),
        DatasetDefinition::new("Scatter_Production")
            .field("id", Integer)
            .field("date", Date)
            .field("production_gross", Float)
            .field("fuel_consumption", Float)
            .date("date")
            .metric("production_gross", "Production_gross")
            .metric("fuel_consumption", "Fuel_consumption"),
        DatasetDefinition::new("Project")
            .field("id", Integer)
            .field("customer", Text)
            .field("description", Text)
            .field("status", Text)
            .field("elapsed_time", Float)
            .field("estimated_time", Float)
            .field("price", Float),
        DatasetDefinition::new("Transaction")
            .field("id", Integer)
            .field("date", Date)
            .field("revenue", Integer)
            .field("net_income", Float)
            .field("expenses", Float)
            .date("date")
            .metric("revenue", "Revenue")
            .metric("expenses", "Expenses")
            .metric("net_income", "Net_income")
            .forecast("revenue"),
    ]
}
