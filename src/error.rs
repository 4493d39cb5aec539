//! Error types for the analytics service
//!
//! Each layer has its own `thiserror` enum. Everything a request can fail with
//! funnels into [`AnalyticsError`], whose [`ErrorKind`] decides the HTTP status.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for dataset queries
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// No dataset is registered under the requested name
    #[error("no such dataset: {0}")]
    NotFound(String),

    /// The requested calendar granularity is not supported
    #[error("invalid granularity \"{0}\": expected one of year, quarter, month, week")]
    InvalidGranularity(String),

    /// A row does not match the descriptor registered for its dataset
    #[error("schema mismatch in dataset {dataset}: {detail}")]
    SchemaMismatch {
        /// Canonical dataset name
        dataset: String,
        /// What was missing or mistyped
        detail: String,
    },

    /// The dataset exists but its shape cannot serve the requested operation
    #[error("dataset {dataset} does not support {operation}")]
    UnsupportedOperation {
        /// Canonical dataset name
        dataset: String,
        /// Operation that was requested
        operation: &'static str,
    },

    /// Storage collaborator failure
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    /// Forecast collaborator failure
    #[error("forecast failure: {0}")]
    Forecast(#[from] ForecastError),
}

/// Coarse classification used at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown dataset
    NotFound,
    /// Unsupported `groupBy` value
    InvalidGranularity,
    /// Registry/storage drift or malformed input row
    SchemaMismatch,
    /// Operation not available for the dataset's shape
    UnsupportedOperation,
    /// Storage or forecast collaborator failed or timed out
    UpstreamFailure,
}

impl AnalyticsError {
    /// Shorthand for building a [`AnalyticsError::SchemaMismatch`]
    pub fn schema_mismatch(dataset: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            dataset: dataset.into(),
            detail: detail.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidGranularity(_) => ErrorKind::InvalidGranularity,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            Self::Storage(_) | Self::Forecast(_) => ErrorKind::UpstreamFailure,
        }
    }
}

/// Storage collaborator errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend holds no table for this dataset
    #[error("no table for dataset: {0}")]
    UnknownDataset(String),

    /// A row with the same id already exists
    #[error("duplicate id {id} in dataset {dataset}")]
    DuplicateId {
        /// Canonical dataset name
        dataset: String,
        /// Conflicting id
        id: i64,
    },

    /// No id is left to assign after the largest one in the table
    #[error("no ids left to assign in dataset {0}")]
    IdsExhausted(String),

    /// A seed row could not be decoded against the dataset schema
    #[error("invalid seed row in dataset {dataset}: {detail}")]
    InvalidSeed {
        /// Canonical dataset name
        dataset: String,
        /// Decoding failure
        detail: String,
    },

    /// Fetch did not complete in time
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Seed file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Forecast collaborator errors
#[derive(Error, Debug)]
pub enum ForecastError {
    /// Forecasting is switched off in configuration
    #[error("forecasting is disabled")]
    Disabled,

    /// The forecast process could not be started
    #[error("failed to start forecast process `{command}`: {source}")]
    Spawn {
        /// Program that was launched
        command: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Communication with the running process failed
    #[error("IO error talking to forecast process: {0}")]
    Io(#[from] std::io::Error),

    /// The process exited unsuccessfully
    #[error("forecast process exited with {status}: {stderr}")]
    Exit {
        /// Exit status description
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The process produced output that is not a forecast
    #[error("malformed forecast output: {0}")]
    MalformedOutput(String),

    /// The process did not answer in time
    #[error("forecast timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors raised while registering dataset descriptors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Table name is empty
    #[error("dataset table name cannot be empty")]
    EmptyName,

    /// A dataset with the same canonical name is already registered
    #[error("dataset already registered: {0}")]
    Duplicate(String),

    /// A referenced field is not declared in the schema
    #[error("dataset {dataset} references undeclared field {field}")]
    UnknownField {
        /// Canonical dataset name
        dataset: String,
        /// Referenced field
        field: String,
    },

    /// The date field is not a date or datetime
    #[error("dataset {dataset}: field {field} is not a date")]
    NotTemporal {
        /// Canonical dataset name
        dataset: String,
        /// Offending field
        field: String,
    },

    /// A metric or forecast field is not numeric
    #[error("dataset {dataset}: field {field} is not numeric")]
    NotNumeric {
        /// Canonical dataset name
        dataset: String,
        /// Offending field
        field: String,
    },

    /// Metrics were declared without a date field to bucket by
    #[error("dataset {0} declares metrics but no date field")]
    MetricsWithoutDate(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::config::ApplicationConfig`]
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was parsed
        path: PathBuf,
        /// Underlying TOML error
        source: toml::de::Error,
    },

    /// Values are present but unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A configured dataset descriptor was rejected
    #[error("invalid dataset definition: {0}")]
    Registry(#[from] RegistryError),

    /// The configured seed file could not be loaded
    #[error("failed to load seed data: {0}")]
    Seed(#[from] StorageError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AnalyticsError>;
