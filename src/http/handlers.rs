//! HTTP request handlers

use super::types::{ApiError, HealthResponse, SelectedTableParams};
use super::AppState;
use crate::query::{QueryOutcome, TableQuery};
use crate::types::Row;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Health
// =============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// =============================================================================
// Dashboard
// =============================================================================

/// `GET /selectedTable`: raw, grouped or forecast view of one dataset
pub async fn selected_table(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SelectedTableParams>,
) -> Result<Json<QueryOutcome>, ApiError> {
    let query = params.into_query()?;
    match state.query.handle(&query).await {
        Ok(outcome) => {
            debug!(dataset = %query.dataset, entries = outcome.len(), "Served table request");
            Ok(Json(outcome))
        },
        Err(e) => {
            warn!(dataset = %query.dataset, error = %e, "Table request failed");
            Err(e.into())
        },
    }
}

/// `GET /dashboard/tables`: chart tables plus `Transaction`
pub async fn dashboard_tables(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(to_owned(state.query.registry().dashboard_tables()))
}

/// `GET /sidenav/tables`: entity tables
pub async fn sidenav_tables(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(to_owned(state.query.registry().sidenav_tables()))
}

fn to_owned(tables: Vec<&str>) -> Vec<String> {
    tables.into_iter().map(str::to_string).collect()
}

// =============================================================================
// Records
// =============================================================================

/// `GET /transactions`
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Row>>, ApiError> {
    list_rows(&state, "transaction").await
}

/// `POST /transactions`
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> Result<Response, ApiError> {
    create_row(&state, "transaction", "transactions", body).await
}

/// `GET /projects`
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Row>>, ApiError> {
    list_rows(&state, "project").await
}

/// `POST /projects`
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> Result<Response, ApiError> {
    create_row(&state, "project", "projects", body).await
}

async fn list_rows(state: &AppState, dataset: &str) -> Result<Json<Vec<Row>>, ApiError> {
    match state.query.handle(&TableQuery::new(dataset)).await? {
        QueryOutcome::Rows(rows) => Ok(Json(rows)),
        other => Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            format!("expected rows, got {} entries of another shape", other.len()),
        )),
    }
}

async fn create_row(
    state: &AppState,
    dataset: &str,
    collection: &str,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("request body must be a JSON object"))?;

    let descriptor = state.query.registry().resolve(dataset)?;
    let row = descriptor.decode_row(object)?;
    let stored = state.query.storage().insert(descriptor.name(), row).await?;

    let id = stored.id().unwrap_or_default();
    info!(dataset = %descriptor.name(), id, "Created record");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/{}/{}", collection, id))],
        Json(stored),
    )
        .into_response())
}
