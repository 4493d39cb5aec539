//! Vision Analytics - business dashboard backend
//!
//! This library provides:
//! - A dataset descriptor registry with declared field kinds
//! - Calendar bucketing by year, quarter, month and ISO week
//! - A generic aggregator that sums descriptor metrics per bucket
//! - A query façade choosing between raw rows, grouped sums and forecasts
//! - An axum HTTP API over pluggable storage and forecast collaborators

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calendar;
pub mod error;
pub mod registry;
pub mod types;

/// Time-bucketed aggregation over dataset descriptors
pub mod aggregation;

/// Configuration management with TOML support
pub mod config;

/// Out-of-process forecasting
pub mod forecast;

/// HTTP router, handlers and middleware
pub mod http;

/// Query façade dispatching table requests
pub mod query;

/// Row storage trait and in-memory backend
pub mod storage;

// Re-export main types
pub use calendar::{BucketKey, Granularity};
pub use error::{AnalyticsError, Result};
pub use query::{QueryFacade, QueryOutcome, TableQuery};
pub use registry::{DatasetDescriptor, DatasetRegistry};
pub use types::{FieldKind, FieldValue, Row};
