//! Row storage
//!
//! The query path only ever reads whole datasets; the CRUD endpoints append
//! single rows. Both go through the [`Storage`] trait so the backing store
//! can be swapped without touching the façade or the HTTP layer.
//!
//! The bundled backend is [`MemoryStorage`], seeded at startup either from a
//! JSON seed file or from the deterministic sample generator in [`seed`].

pub mod memory;
pub mod seed;

pub use memory::MemoryStorage;
pub use seed::SampleData;

use crate::error::StorageError;
use crate::types::Row;
use async_trait::async_trait;

// =============================================================================
// Storage Trait
// =============================================================================

/// Source and sink of dataset rows
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Identifier of this backend, used in logs
    fn backend_id(&self) -> &str;

    /// Every row of a dataset, in insertion order
    async fn fetch_all(&self, dataset: &str) -> Result<Vec<Row>, StorageError>;

    /// Append a row, assigning an id if it has none, and return the stored row
    async fn insert(&self, dataset: &str, row: Row) -> Result<Row, StorageError>;
}
