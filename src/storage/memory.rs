//! In-memory storage backend

use super::seed::{self, SampleData};
use super::Storage;
use crate::error::StorageError;
use crate::registry::DatasetRegistry;
use crate::types::{FieldValue, Row};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Tables held in process memory, keyed by canonical dataset name
///
/// Only datasets that have a table accept inserts; tables are created for
/// every registered dataset by the constructors below.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryStorage {
    /// Storage with no tables at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage with one empty table per registered dataset
    pub fn empty(registry: &DatasetRegistry) -> Self {
        let tables = registry
            .iter()
            .map(|d| (d.name().to_string(), Vec::new()))
            .collect();
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Storage populated by the sample generator
    pub fn with_sample_data(registry: &DatasetRegistry, sample: &SampleData) -> Self {
        let storage = Self::empty(registry);
        for (dataset, rows) in seed::generate(registry, sample) {
            debug!(dataset = %dataset, rows = rows.len(), "Generated sample rows");
            storage.load(&dataset, rows);
        }
        storage
    }

    /// Storage populated from a JSON seed file
    ///
    /// The file holds one object mapping dataset names (any case) to arrays
    /// of row objects. Each row is decoded against its dataset's schema.
    /// Datasets absent from the file start empty.
    pub fn from_seed_file(
        registry: &DatasetRegistry,
        path: impl AsRef<Path>,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let seed: HashMap<String, Vec<JsonValue>> = serde_json::from_str(&text)?;

        let storage = Self::empty(registry);
        let mut loaded = HashSet::new();
        for (name, values) in seed {
            let descriptor = registry
                .resolve(&name)
                .map_err(|_| StorageError::UnknownDataset(name.clone()))?;
            let invalid = |detail: String| StorageError::InvalidSeed {
                dataset: descriptor.name().to_string(),
                detail,
            };
            if !loaded.insert(descriptor.name()) {
                return Err(invalid(format!("dataset listed more than once (as {:?})", name)));
            }

            let mut rows = Vec::with_capacity(values.len());
            let mut ids = HashSet::new();
            for (i, value) in values.iter().enumerate() {
                let object = value
                    .as_object()
                    .ok_or_else(|| invalid(format!("row {} is not an object", i)))?;
                let row = descriptor
                    .decode_row(object)
                    .map_err(|e| invalid(format!("row {}: {}", i, e)))?;
                if let Some(id) = row.id().filter(|&id| id != 0) {
                    if !ids.insert(id) {
                        return Err(invalid(format!("row {}: duplicate id {}", i, id)));
                    }
                }
                rows.push(row);
            }
            let rows = assign_missing_ids(descriptor.name(), rows)?;
            storage.load(descriptor.name(), rows);
        }

        info!(path = %path.display(), "Loaded seed file");
        Ok(storage)
    }

    /// Replace the contents of a table, creating it if needed
    pub fn load(&self, dataset: &str, rows: Vec<Row>) {
        self.tables.write().insert(dataset.to_string(), rows);
    }

    /// Row count per table
    pub fn table_sizes(&self) -> Vec<(String, usize)> {
        let mut sizes: Vec<_> = self
            .tables
            .read()
            .iter()
            .map(|(name, rows)| (name.clone(), rows.len()))
            .collect();
        sizes.sort();
        sizes
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn backend_id(&self) -> &str {
        "memory"
    }

    async fn fetch_all(&self, dataset: &str) -> Result<Vec<Row>, StorageError> {
        self.tables
            .read()
            .get(dataset)
            .cloned()
            .ok_or_else(|| StorageError::UnknownDataset(dataset.to_string()))
    }

    async fn insert(&self, dataset: &str, mut row: Row) -> Result<Row, StorageError> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(dataset)
            .ok_or_else(|| StorageError::UnknownDataset(dataset.to_string()))?;

        match row.id().filter(|&id| id != 0) {
            Some(id) => {
                if table.iter().any(|r| r.id() == Some(id)) {
                    return Err(StorageError::DuplicateId {
                        dataset: dataset.to_string(),
                        id,
                    });
                }
            },
            None => {
                row.insert("id", FieldValue::Integer(next_id(dataset, table)?));
            },
        }

        table.push(row.clone());
        Ok(row)
    }
}

/// One past the largest id in the table
fn next_id(dataset: &str, rows: &[Row]) -> Result<i64, StorageError> {
    rows.iter()
        .filter_map(Row::id)
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| StorageError::IdsExhausted(dataset.to_string()))
}

fn assign_missing_ids(dataset: &str, mut rows: Vec<Row>) -> Result<Vec<Row>, StorageError> {
    let largest = rows.iter().filter_map(Row::id).max().unwrap_or(0);
    let mut assigned = 0;
    for row in &mut rows {
        if row.id().filter(|&id| id != 0).is_none() {
            assigned += 1;
            let id = largest
                .checked_add(assigned)
                .ok_or_else(|| StorageError::IdsExhausted(dataset.to_string()))?;
            row.insert("id", FieldValue::Integer(id));
        }
    }
    Ok(rows)
}
