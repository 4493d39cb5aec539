//! Deterministic sample data
//!
//! Chart datasets get `rows` records dated within 2020. The transaction and
//! project tables follow their own value ranges; any other dataset is filled
//! per declared field kind.

use crate::registry::{DatasetDescriptor, DatasetRegistry};
use crate::types::{FieldKind, FieldValue, Row};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const CUSTOMERS: [&str; 5] = [
    "Test Org.",
    "ABC Corporation",
    "123 Company",
    "XYZ Inc.",
    "Demo Group",
];

const DESCRIPTIONS: [&str; 5] = [
    "Software development",
    "Website design",
    "Product development",
    "Marketing campaign",
    "Sales promotion",
];

const STATUSES: [&str; 6] = [
    "Delivered",
    "Completed",
    "Active",
    "Pending",
    "Inactive",
    "Cancelled",
];

/// Sample generator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleData {
    /// Rows per dated dataset
    pub rows: usize,
    /// Rows in the project table
    pub projects: usize,
    /// RNG seed
    pub seed: u64,
}

impl Default for SampleData {
    fn default() -> Self {
        Self {
            rows: 250,
            projects: 50,
            seed: 2020,
        }
    }
}

/// Generate rows for every registered dataset, in registration order
///
/// Each dataset draws from its own RNG stream derived from the seed, so
/// registering an extra dataset does not change the others.
pub fn generate(registry: &DatasetRegistry, sample: &SampleData) -> Vec<(String, Vec<Row>)> {
    registry
        .iter()
        .enumerate()
        .map(|(i, descriptor)| {
            let mut rng = StdRng::seed_from_u64(sample.seed.wrapping_add(i as u64));
            let rows = match descriptor.name() {
                "transaction" => transactions(&mut rng, sample.rows),
                "project" => projects(&mut rng, sample.projects),
                _ if descriptor.date_field().is_some() => {
                    generic_rows(&mut rng, descriptor, sample.rows)
                },
                _ => Vec::new(),
            };
            (descriptor.name().to_string(), rows)
        })
        .collect()
}

fn day_in_2020(rng: &mut StdRng) -> NaiveDate {
    NaiveDate::from_yo_opt(2020, rng.gen_range(1..=365)).unwrap_or(NaiveDate::MIN)
}

fn transactions(rng: &mut StdRng, count: usize) -> Vec<Row> {
    (1..=count as i64)
        .map(|id| {
            let revenue: i64 = rng.gen_range(100_000..1_000_000);
            let net_income = revenue as f64 * (rng.gen::<f64>() * 0.1 + 0.05);
            let expenses = revenue as f64 * (rng.gen::<f64>() * 0.05 + 0.01);
            Row::new()
                .with("id", FieldValue::Integer(id))
                .with("date", FieldValue::Date(day_in_2020(rng)))
                .with("revenue", FieldValue::Integer(revenue))
                .with("net_income", FieldValue::Float(net_income))
                .with("expenses", FieldValue::Float(expenses))
        })
        .collect()
}

fn projects(rng: &mut StdRng, count: usize) -> Vec<Row> {
    (1..=count as i64)
        .map(|id| {
            let customer = CUSTOMERS[rng.gen_range(0..CUSTOMERS.len())];
            let description = DESCRIPTIONS[rng.gen_range(0..DESCRIPTIONS.len())];
            let status = STATUSES[rng.gen_range(0..STATUSES.len())];
            let price = rng.gen_range(1_000..100_000) as f64 / 100.0;
            Row::new()
                .with("id", FieldValue::Integer(id))
                .with("customer", FieldValue::Text(customer.to_string()))
                .with("description", FieldValue::Text(description.to_string()))
                .with("status", FieldValue::Text(status.to_string()))
                .with("elapsed_time", FieldValue::Float(rng.gen_range(1..1000) as f64))
                .with("estimated_time", FieldValue::Float(rng.gen_range(1..1000) as f64))
                .with("price", FieldValue::Float(price))
        })
        .collect()
}

fn generic_rows(rng: &mut StdRng, descriptor: &DatasetDescriptor, count: usize) -> Vec<Row> {
    (1..=count as i64)
        .map(|id| {
            descriptor
                .fields()
                .iter()
                .map(|spec| {
                    let value = match (spec.name.as_str(), spec.kind) {
                        ("id", FieldKind::Integer) => FieldValue::Integer(id),
                        (_, FieldKind::Integer) => FieldValue::Integer(rng.gen_range(1000..10000)),
                        (_, FieldKind::Float) => FieldValue::Float(rng.gen()),
                        (_, FieldKind::Text) => FieldValue::Text(format!("{} {}", spec.name, id)),
                        (_, FieldKind::Date) => FieldValue::Date(day_in_2020(rng)),
                        (_, FieldKind::DateTime) => {
                            let secs: u32 = rng.gen_range(0..86_400);
                            day_in_2020(rng)
                                .and_hms_opt(secs / 3600, secs / 60 % 60, secs % 60)
                                .map_or(FieldValue::Null, FieldValue::DateTime)
                        },
                    };
                    (spec.name.clone(), value)
                })
                .collect::<Row>()
        })
        .collect()
}
