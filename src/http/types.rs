//! Request and response types for the HTTP API

use crate::error::{AnalyticsError, ErrorKind, StorageError};
use crate::query::TableQuery;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

// =============================================================================
// Query Parameters
// =============================================================================

/// Query string of `GET /selectedTable`
///
/// Every field is read as a string so malformed values produce this API's
/// error body instead of the extractor's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SelectedTableParams {
    /// Dataset name (required)
    #[serde(rename = "selectedTable", default)]
    pub selected_table: Option<String>,
    /// Calendar granularity
    #[serde(rename = "groupBy", default)]
    pub group_by: Option<String>,
    /// `true` requests a forecast
    #[serde(rename = "shouldForecast", default)]
    pub should_forecast: Option<String>,
    /// Forecast horizon in days
    #[serde(default)]
    pub period: Option<String>,
}

impl SelectedTableParams {
    /// Validate the parameters into a table query
    pub fn into_query(self) -> Result<TableQuery, ApiError> {
        let dataset = self
            .selected_table
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("missing query parameter selectedTable"))?;

        let period = match self.period.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(p) => Some(p.parse::<i64>().map_err(|_| {
                ApiError::bad_request(format!("period must be an integer, got \"{}\"", p))
            })?),
        };
        let should_forecast = self
            .should_forecast
            .as_deref()
            .map(|s| s.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let mut query = TableQuery::new(dataset);
        query.group_by = self.group_by;
        if should_forecast {
            if let Some(period) = period.filter(|&p| p > 0) {
                let period = u32::try_from(period).map_err(|_| {
                    ApiError::bad_request(format!("period is too large: {}", period))
                })?;
                query = query.forecast(period);
            }
        }
        Ok(query)
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the server answers
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Error response
///
/// Serialized as `{"error_code": ..., "error_message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Stable machine-readable code
    pub code: &'static str,
    /// Human-readable detail
    pub message: String,
}

impl ApiError {
    /// Build an error response
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Malformed HTTP input
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        match &err {
            AnalyticsError::Storage(StorageError::DuplicateId { .. }) => {
                return Self::new(StatusCode::BAD_REQUEST, "DUPLICATE_ID", err.to_string());
            },
            AnalyticsError::Storage(StorageError::IdsExhausted(_)) => {
                return Self::new(StatusCode::BAD_REQUEST, "IDS_EXHAUSTED", err.to_string());
            },
            _ => {},
        }
        let (status, code) = match err.kind() {
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ErrorKind::InvalidGranularity => (StatusCode::BAD_REQUEST, "INVALID_GRANULARITY"),
            ErrorKind::SchemaMismatch => (StatusCode::BAD_REQUEST, "SCHEMA_MISMATCH"),
            ErrorKind::UnsupportedOperation => (StatusCode::BAD_REQUEST, "UNSUPPORTED_OPERATION"),
            ErrorKind::UpstreamFailure => (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILURE"),
        };
        Self::new(status, code, err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        AnalyticsError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error_code": self.code,
            "error_message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}
