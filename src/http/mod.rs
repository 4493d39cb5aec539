//! HTTP API
//!
//! # Endpoints
//!
//! ## Dashboard
//! - `GET /selectedTable` - Raw, grouped or forecast view of one dataset
//! - `GET /dashboard/tables` - Tables shown on the dashboard
//! - `GET /sidenav/tables` - Tables shown in the side navigation
//!
//! ## Records
//! - `GET /transactions`, `POST /transactions`
//! - `GET /projects`, `POST /projects`
//!
//! ## Admin
//! - `GET /health` - Health check, exempt from origin validation

pub mod handlers;
pub mod middleware;
pub mod types;

pub use types::{ApiError, HealthResponse, SelectedTableParams};

use crate::config::ApplicationConfig;
use crate::error::ConfigError;
use crate::forecast::{DisabledForecaster, Forecaster, ProcessForecaster};
use crate::query::QueryFacade;
use crate::storage::{MemoryStorage, Storage};
use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state of the HTTP server
pub struct AppState {
    /// Query façade over registry, storage and forecaster
    pub query: QueryFacade,
    /// Origin every request must carry, if any
    pub required_origin: Option<String>,
    /// CORS allowed origins (empty = allow any origin)
    pub cors_allowed_origins: Vec<String>,
}

impl AppState {
    /// State with no origin restrictions
    pub fn new(query: QueryFacade) -> Self {
        Self {
            query,
            required_origin: None,
            cors_allowed_origins: Vec::new(),
        }
    }

    /// Build registry, storage and forecaster from configuration
    pub fn from_config(config: &ApplicationConfig) -> Result<Self, ConfigError> {
        let registry = Arc::new(config.build_registry()?);

        let storage = match &config.storage.seed_file {
            Some(path) => MemoryStorage::from_seed_file(&registry, path)?,
            None if config.storage.generate_sample_data => {
                MemoryStorage::with_sample_data(&registry, &config.storage.sample_data())
            },
            None => MemoryStorage::empty(&registry),
        };
        for (dataset, rows) in storage.table_sizes() {
            info!(dataset = %dataset, rows, "Table ready");
        }

        let forecaster: Arc<dyn Forecaster> = if config.forecast.enabled {
            Arc::new(ProcessForecaster::new(
                config.forecast.command.clone(),
                config.forecast.args.clone(),
            ))
        } else {
            warn!("Forecasting is disabled; forecast requests will fail");
            Arc::new(DisabledForecaster)
        };

        let storage: Arc<dyn Storage> = Arc::new(storage);
        Ok(Self {
            query: QueryFacade::new(registry, storage, forecaster, config.query_timeouts()),
            required_origin: config.security.required_origin.clone(),
            cors_allowed_origins: config.security.cors_allowed_origins.clone(),
        })
    }
}

/// Build CORS layer from configuration
pub fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if cors_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/selectedTable", get(handlers::selected_table))
        .route("/dashboard/tables", get(handlers::dashboard_tables))
        .route("/sidenav/tables", get(handlers::sidenav_tables))
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::validate_origin,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&state.cors_allowed_origins))
}
