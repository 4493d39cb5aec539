//! Query façade
//!
//! Turns a table request into one of three answers:
//!
//! ```text
//! resolve ──► validate groupBy ──► fetch rows ──┬─ forecast requested ──► forecaster
//!                                               ├─ groupBy given ───────► aggregate
//!                                               └─ otherwise ───────────► raw rows
//! ```
//!
//! The granularity is parsed before any I/O so a bad `groupBy` is rejected
//! even when the forecast branch would win. Fetch and forecast are the only
//! suspension points and each is bounded by its own timeout.

use crate::aggregation::{self, AggregationResult};
use crate::calendar::Granularity;
use crate::error::{AnalyticsError, ForecastError, Result, StorageError};
use crate::forecast::{self, ForecastPoint, ForecastRequest, Forecaster};
use crate::registry::{DatasetDescriptor, DatasetRegistry};
use crate::storage::Storage;
use crate::types::{Row, DATE_FORMAT};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A request against one dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    /// Dataset name, any case
    pub dataset: String,
    /// Requested granularity; blank counts as absent
    pub group_by: Option<String>,
    /// Forecast horizon in days, when a forecast was requested
    pub forecast_period: Option<u32>,
}

impl TableQuery {
    /// Raw rows of a dataset
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            ..Self::default()
        }
    }

    /// Group by calendar period
    pub fn group_by(mut self, granularity: impl Into<String>) -> Self {
        self.group_by = Some(granularity.into());
        self
    }

    /// Forecast `period` days ahead; a zero period means no forecast
    pub fn forecast(mut self, period: u32) -> Self {
        self.forecast_period = Some(period).filter(|&p| p > 0);
        self
    }
}

/// Result of a table request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    /// Every row, unmodified
    Rows(Vec<Row>),
    /// One entry per calendar bucket
    Grouped(Vec<AggregationResult>),
    /// Forecast points ordered by date
    Forecast(Vec<ForecastPoint>),
}

impl QueryOutcome {
    /// Number of entries in the answer
    pub fn len(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            Self::Grouped(buckets) => buckets.len(),
            Self::Forecast(points) => points.len(),
        }
    }

    /// Whether the answer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Upper bounds on collaborator calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTimeouts {
    /// Bound on fetching a dataset
    pub fetch: Duration,
    /// Bound on one forecast
    pub forecast: Duration,
}

impl Default for QueryTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(10),
            forecast: Duration::from_secs(120),
        }
    }
}

/// Entry point for table requests
pub struct QueryFacade {
    registry: Arc<DatasetRegistry>,
    storage: Arc<dyn Storage>,
    forecaster: Arc<dyn Forecaster>,
    timeouts: QueryTimeouts,
}

impl QueryFacade {
    /// Build a façade over shared collaborators
    pub fn new(
        registry: Arc<DatasetRegistry>,
        storage: Arc<dyn Storage>,
        forecaster: Arc<dyn Forecaster>,
        timeouts: QueryTimeouts,
    ) -> Self {
        Self {
            registry,
            storage,
            forecaster,
            timeouts,
        }
    }

    /// Registry the façade resolves against
    pub fn registry(&self) -> &Arc<DatasetRegistry> {
        &self.registry
    }

    /// Storage the façade reads from
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Answer a table request
    pub async fn handle(&self, query: &TableQuery) -> Result<QueryOutcome> {
        let descriptor = self.registry.resolve(&query.dataset)?;
        let granularity = query
            .group_by
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::parse::<Granularity>)
            .transpose()?;

        if query.forecast_period.is_some() && descriptor.forecast_field().is_none() {
            return Err(unsupported(descriptor, "forecasting"));
        }
        if granularity.is_some() && descriptor.date_field().is_none() {
            return Err(unsupported(descriptor, "calendar grouping"));
        }

        let rows = self.fetch(descriptor).await?;

        if let Some(period) = query.forecast_period {
            let points = self.forecast(descriptor, &rows, period).await?;
            return Ok(QueryOutcome::Forecast(points));
        }
        if let Some(granularity) = granularity {
            let buckets = aggregation::aggregate(&rows, descriptor, granularity)?;
            debug!(
                dataset = %descriptor.name(),
                granularity = %granularity,
                rows = rows.len(),
                buckets = buckets.len(),
                "Aggregated dataset"
            );
            return Ok(QueryOutcome::Grouped(buckets));
        }
        Ok(QueryOutcome::Rows(rows))
    }

    async fn fetch(&self, descriptor: &DatasetDescriptor) -> Result<Vec<Row>> {
        let limit = self.timeouts.fetch;
        match tokio::time::timeout(limit, self.storage.fetch_all(descriptor.name())).await {
            Ok(rows) => Ok(rows?),
            Err(_) => {
                warn!(dataset = %descriptor.name(), timeout = ?limit, "Dataset fetch timed out");
                Err(StorageError::Timeout(limit).into())
            },
        }
    }

    async fn forecast(
        &self,
        descriptor: &DatasetDescriptor,
        rows: &[Row],
        period: u32,
    ) -> Result<Vec<ForecastPoint>> {
        let field = descriptor
            .forecast_field()
            .ok_or_else(|| unsupported(descriptor, "forecasting"))?;

        let mut request = ForecastRequest {
            dates: Vec::with_capacity(rows.len()),
            values: Vec::with_capacity(rows.len()),
            period,
        };
        for row in rows {
            request
                .dates
                .push(descriptor.date_of(row)?.format(DATE_FORMAT).to_string());
            request.values.push(descriptor.number_of(row, field)?);
        }

        let limit = self.timeouts.forecast;
        let raw = match tokio::time::timeout(limit, self.forecaster.forecast(request)).await {
            Ok(raw) => raw?,
            Err(_) => {
                warn!(dataset = %descriptor.name(), timeout = ?limit, "Forecast timed out");
                return Err(ForecastError::Timeout(limit).into());
            },
        };
        let points = forecast::finish(raw)?;
        debug!(dataset = %descriptor.name(), period, points = points.len(), "Forecast complete");
        Ok(points)
    }
}

fn unsupported(descriptor: &DatasetDescriptor, operation: &'static str) -> AnalyticsError {
    AnalyticsError::UnsupportedOperation {
        dataset: descriptor.name().to_string(),
        operation,
    }
}
