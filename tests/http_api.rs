//! HTTP API Integration Tests
//!
//! Drives the router with `tower::ServiceExt::oneshot`, without binding a socket.
//!
//! # Test Coverage
//!
//! 1. **Health Endpoint** - GET /health
//! 2. **Table Views** - GET /selectedTable raw, grouped and forecast
//! 3. **Error Handling** - Unknown tables, bad granularity, collaborator failures
//! 4. **Table Listings** - GET /dashboard/tables, GET /sidenav/tables
//! 5. **Records** - GET/POST /transactions and /projects
//! 6. **Origin Validation** - 401/403 when a required origin is configured
//! 7. **Configuration** - State built from a config with a seed file

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;
use vision_analytics::config::ApplicationConfig;
use vision_analytics::error::ForecastError;
use vision_analytics::forecast::{ForecastRequest, Forecaster, RawForecastPoint};
use vision_analytics::http::{build_router, AppState};
use vision_analytics::query::{QueryFacade, QueryTimeouts};
use vision_analytics::registry::DatasetRegistry;
use vision_analytics::storage::{MemoryStorage, Storage};
use vision_analytics::types::{FieldValue, Row};

// =============================================================================
// Test Collaborators
// =============================================================================

/// Forecaster that answers with a fixed series and records requests
#[derive(Default)]
struct StubForecaster {
    requests: Mutex<Vec<ForecastRequest>>,
    fail: bool,
}

#[async_trait]
impl Forecaster for StubForecaster {
    async fn forecast(
        &self,
        request: ForecastRequest,
    ) -> Result<Vec<RawForecastPoint>, ForecastError> {
        self.requests.lock().push(request);
        if self.fail {
            return Err(ForecastError::Exit {
                status: "exit status: 1".into(),
                stderr: "prophet exploded".into(),
            });
        }
        Ok(vec![
            RawForecastPoint {
                ds: "2021-02-21 00:00:00".into(),
                yhat: 52.5,
                yhat_lower: 40.49,
                yhat_upper: 63.5,
            },
            RawForecastPoint {
                ds: "2021-02-20 00:00:00".into(),
                yhat: 50.0,
                yhat_lower: 45.0,
                yhat_upper: 55.0,
            },
        ])
    }
}

fn date(y: i32, m: u32, d: u32) -> FieldValue {
    FieldValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn revenue_row(id: i64, d: FieldValue, expenses: f64, net_income: f64) -> Row {
    Row::new()
        .with("id", FieldValue::Integer(id))
        .with("date", d)
        .with("expenses", FieldValue::Float(expenses))
        .with("net_income", FieldValue::Float(net_income))
}

fn production_row(id: i64, d: FieldValue, production: i64) -> Row {
    Row::new()
        .with("id", FieldValue::Integer(id))
        .with("date", d)
        .with("production", FieldValue::Integer(production))
}

fn create_state(forecaster: Arc<StubForecaster>) -> AppState {
    let registry = Arc::new(DatasetRegistry::builtin());
    let storage = MemoryStorage::empty(&registry);
    storage.load(
        "bar_revenue",
        vec![
            revenue_row(1, date(2021, 1, 15), 100.0, 40.0),
            revenue_row(2, date(2021, 2, 20), 50.0, 10.0),
        ],
    );
    storage.load(
        "scatter_revenue",
        vec![
            revenue_row(1, date(2021, 1, 10), 1.0, 2.0),
            revenue_row(2, date(2021, 1, 25), 3.0, 4.0),
        ],
    );
    storage.load(
        "pie_production",
        vec![
            production_row(1, date(2022, 12, 26), 10),
            production_row(2, date(2022, 12, 31), 20),
            production_row(3, date(2023, 1, 1), 30),
            production_row(4, date(2021, 1, 1), 5),
        ],
    );

    let storage: Arc<dyn Storage> = Arc::new(storage);
    AppState::new(QueryFacade::new(
        registry,
        storage,
        forecaster,
        QueryTimeouts::default(),
    ))
}

fn create_test_server() -> (Router, Arc<StubForecaster>) {
    let forecaster = Arc::new(StubForecaster::default());
    let router = build_router(Arc::new(create_state(forecaster.clone())));
    (router, forecaster)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Send a request and return status, headers and JSON body
async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));
    (status, headers, json)
}

/// Helper to make a GET request
async fn get_request(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, _, json) = send(router, request).await;
    (status, json)
}

/// Helper to make a POST request with JSON body
async fn post_request(router: &Router, uri: &str, body: Value) -> (StatusCode, HeaderMap, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(router, request).await
}

// =============================================================================
// Tests: Health Endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (router, _) = create_test_server();
    let (status, json) = get_request(&router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// Tests: Table Views
// =============================================================================

#[tokio::test]
async fn test_raw_rows() {
    let (router, _) = create_test_server();
    let (status, json) = get_request(&router, "/selectedTable?selectedTable=Bar_Revenue").await;

    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["date"], "2021-01-15");
    assert_eq!(rows[0]["id"], 1);
}

#[tokio::test]
async fn test_empty_group_by_returns_raw_rows() {
    let (router, _) = create_test_server();
    let (status, json) =
        get_request(&router, "/selectedTable?selectedTable=bar_revenue&groupBy=").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json[0].get("expenses").is_some());
}

#[tokio::test]
async fn test_group_by_month() {
    let (router, _) = create_test_server();
    let (status, json) =
        get_request(&router, "/selectedTable?selectedTable=bar_revenue&groupBy=month").await;

    assert_eq!(status, StatusCode::OK);
    let buckets = json.as_array().unwrap();
    assert_eq!(buckets.len(), 2);

    let jan = buckets.iter().find(|b| b["Date"] == "2021-01").unwrap();
    assert_eq!(jan.as_object().unwrap().len(), 3);
    assert_eq!(jan["Revenue"].as_f64(), Some(100.0));
    assert_eq!(jan["Net_income"].as_f64(), Some(40.0));

    let feb = buckets.iter().find(|b| b["Date"] == "2021-02").unwrap();
    assert_eq!(feb["Revenue"].as_f64(), Some(50.0));
    assert_eq!(feb["Net_income"].as_f64(), Some(10.0));
}

#[tokio::test]
async fn test_group_by_quarter() {
    let (router, _) = create_test_server();
    let (status, json) = get_request(
        &router,
        "/selectedTable?selectedTable=Scatter_Revenue&groupBy=QUARTER",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!([{"Date": "2021 Q1", "Revenue": 4.0, "Net_income": 6.0}])
    );
}

#[tokio::test]
async fn test_group_by_week() {
    let (router, _) = create_test_server();
    let (status, json) =
        get_request(&router, "/selectedTable?selectedTable=pie_production&groupBy=week").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!([
            {"Date": "2020 W53", "Production": 5},
            {"Date": "2022 W52", "Production": 60}
        ])
    );
}

#[tokio::test]
async fn test_group_by_year_sums_integers_exactly() {
    let (router, _) = create_test_server();
    let (_, json) =
        get_request(&router, "/selectedTable?selectedTable=pie_production&groupBy=year").await;

    let total: i64 = json
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["Production"].as_i64().unwrap())
        .sum();
    assert_eq!(total, 65);
}

#[tokio::test]
async fn test_forecast() {
    let (router, forecaster) = create_test_server();
    let (status, json) = get_request(
        &router,
        "/selectedTable?selectedTable=bar_revenue&groupBy=month&shouldForecast=true&period=2",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!([
            {"Date": "2021-02-20", "Yhat": 50, "Yhat_lower": 45, "Yhat_upper": 55},
            {"Date": "2021-02-21", "Yhat": 52, "Yhat_lower": 40, "Yhat_upper": 64}
        ])
    );

    let requests = forecaster.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].dates, vec!["2021-01-15", "2021-02-20"]);
    assert_eq!(requests[0].values, vec![100.0, 50.0]);
    assert_eq!(requests[0].period, 2);
}

#[tokio::test]
async fn test_forecast_needs_positive_period() {
    let (router, forecaster) = create_test_server();
    let (status, json) = get_request(
        &router,
        "/selectedTable?selectedTable=bar_revenue&groupBy=year&shouldForecast=true&period=0",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["Date"], "2021");
    assert!(forecaster.requests.lock().is_empty());
}

// =============================================================================
// Tests: Error Handling
// =============================================================================

#[tokio::test]
async fn test_unknown_table() {
    let (router, _) = create_test_server();
    let (status, json) = get_request(&router, "/selectedTable?selectedTable=not_a_table").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error_code"], "NOT_FOUND");
    assert!(json["error_message"]
        .as_str()
        .unwrap()
        .contains("not_a_table"));
}

#[tokio::test]
async fn test_missing_table_parameter() {
    let (router, _) = create_test_server();
    let (status, json) = get_request(&router, "/selectedTable?groupBy=month").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_invalid_granularity() {
    let (router, forecaster) = create_test_server();
    let (status, json) = get_request(
        &router,
        "/selectedTable?selectedTable=bar_revenue&groupBy=fortnight&shouldForecast=true&period=5",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "INVALID_GRANULARITY");
    assert!(json["error_message"].as_str().unwrap().contains("fortnight"));
    assert!(forecaster.requests.lock().is_empty());
}

#[tokio::test]
async fn test_forecast_unsupported_for_dataset() {
    let (router, _) = create_test_server();
    let (status, json) = get_request(
        &router,
        "/selectedTable?selectedTable=pie_production&shouldForecast=true&period=5",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "UNSUPPORTED_OPERATION");
}

#[tokio::test]
async fn test_forecast_failure_is_bad_gateway() {
    let forecaster = Arc::new(StubForecaster {
        fail: true,
        ..StubForecaster::default()
    });
    let router = build_router(Arc::new(create_state(forecaster)));
    let (status, json) = get_request(
        &router,
        "/selectedTable?selectedTable=bar_revenue&shouldForecast=true&period=5",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error_code"], "UPSTREAM_FAILURE");
    assert!(json["error_message"]
        .as_str()
        .unwrap()
        .contains("prophet exploded"));
}

// =============================================================================
// Tests: Table Listings
// =============================================================================

#[tokio::test]
async fn test_dashboard_tables() {
    let (router, _) = create_test_server();
    let (status, json) = get_request(&router, "/dashboard/tables").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!([
            "Bar_Revenue",
            "Pie_Production",
            "Radar_Production",
            "Scatter_Revenue",
            "Scatter_Production",
            "Transaction"
        ])
    );
}

#[tokio::test]
async fn test_sidenav_tables() {
    let (router, _) = create_test_server();
    let (status, json) = get_request(&router, "/sidenav/tables").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!(["Project", "Transaction"]));
}

// =============================================================================
// Tests: Records
// =============================================================================

#[tokio::test]
async fn test_create_and_list_transactions() {
    let (router, _) = create_test_server();

    let (status, headers, json) = post_request(
        &router,
        "/transactions",
        json!({"date": "2021-03-01", "revenue": 250000, "net_income": 2500.5, "expenses": 900}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers[header::LOCATION], "/transactions/1");
    assert_eq!(json["id"], 1);
    assert_eq!(json["revenue"], 250000);

    let (status, _, json) = post_request(
        &router,
        "/transactions",
        json!({"id": 7, "date": "2021-03-02", "revenue": 1, "net_income": 1, "expenses": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["id"], 7);

    let (status, json) = get_request(&router, "/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (_, json) = get_request(
        &router,
        "/selectedTable?selectedTable=transaction&groupBy=month",
    )
    .await;
    assert_eq!(json[0]["Date"], "2021-03");
    assert_eq!(json[0]["Revenue"], 250001);
}

#[tokio::test]
async fn test_create_transaction_rejects_bad_input() {
    let (router, _) = create_test_server();

    let (status, _, json) = post_request(
        &router,
        "/transactions",
        json!({"date": "2021-03-01", "revenue": 1, "net_income": 1, "expenses": 1, "tax": 2}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "SCHEMA_MISMATCH");

    let (status, _, _) = post_request(
        &router,
        "/transactions",
        json!({"date": "yesterday", "revenue": 1, "net_income": 1, "expenses": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, json) = post_request(&router, "/transactions", json!([1, 2])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "BAD_REQUEST");

    let request = Request::builder()
        .method("POST")
        .uri("/transactions")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, json) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_create_transaction_duplicate_id() {
    let (router, _) = create_test_server();
    let body = json!({"id": 3, "date": "2021-03-01", "revenue": 1, "net_income": 1, "expenses": 1});

    let (status, _, _) = post_request(&router, "/transactions", body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _, json) = post_request(&router, "/transactions", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "DUPLICATE_ID");
}

#[tokio::test]
async fn test_create_transaction_after_largest_id() {
    let (router, _) = create_test_server();
    let body = json!({"date": "2021-03-01", "revenue": 1, "net_income": 1, "expenses": 1});

    let mut explicit = body.clone();
    explicit["id"] = json!(i64::MAX);
    let (status, _, _) = post_request(&router, "/transactions", explicit).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, json) = post_request(&router, "/transactions", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "IDS_EXHAUSTED");

    let (_, json) = get_request(&router, "/transactions").await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_project() {
    let (router, _) = create_test_server();
    let (status, headers, json) = post_request(
        &router,
        "/projects",
        json!({
            "customer": "Demo Group",
            "description": "Website design",
            "status": "Active",
            "elapsed_time": 12,
            "estimated_time": 40,
            "price": 199.99
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers[header::LOCATION], "/projects/1");
    assert_eq!(json["status"], "Active");

    let (_, json) = get_request(&router, "/projects").await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

// =============================================================================
// Tests: Origin Validation
// =============================================================================

fn guarded_router() -> Router {
    let mut state = create_state(Arc::new(StubForecaster::default()));
    state.required_origin = Some("https://dashboard.example.com".to_string());
    build_router(Arc::new(state))
}

fn request_with_origin(uri: &str, origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_missing_origin_is_unauthorized() {
    let router = guarded_router();
    let (status, _, json) = send(&router, request_with_origin("/dashboard/tables", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error_code"], "MISSING_ORIGIN");
}

#[tokio::test]
async fn test_foreign_origin_is_forbidden() {
    let router = guarded_router();
    let (status, _, json) = send(
        &router,
        request_with_origin("/dashboard/tables", Some("https://evil.example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error_code"], "FORBIDDEN_ORIGIN");
}

#[tokio::test]
async fn test_matching_origin_passes() {
    let router = guarded_router();
    let (status, headers, _) = send(
        &router,
        request_with_origin("/sidenav/tables", Some("https://dashboard.example.com/")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_health_is_exempt_from_origin_check() {
    let router = guarded_router();
    let (status, _, _) = send(&router, request_with_origin("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Tests: Configuration
// =============================================================================

#[tokio::test]
async fn test_state_from_config_with_seed_file() {
    let mut seed = tempfile::NamedTempFile::new().unwrap();
    write!(
        seed,
        r#"{{"Radar_Production": [
            {{"id": 1, "date": "2020-04-01", "production": 1500}},
            {{"id": 2, "date": "2020-05-01", "production": 2500}}
        ]}}"#
    )
    .unwrap();

    let mut config = ApplicationConfig::default();
    config.storage.seed_file = Some(seed.path().to_path_buf());
    config.forecast.enabled = false;

    let router = build_router(Arc::new(AppState::from_config(&config).unwrap()));
    let (status, json) = get_request(
        &router,
        "/selectedTable?selectedTable=radar_production&groupBy=quarter",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([{"Date": "2020 Q2", "Production": 4000}]));

    let (status, json) = get_request(
        &router,
        "/selectedTable?selectedTable=transaction&shouldForecast=true&period=3",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error_message"].as_str().unwrap().contains("disabled"));
}

#[tokio::test]
async fn test_state_from_config_with_sample_data() {
    let mut config = ApplicationConfig::default();
    config.storage.sample_rows = 30;
    config.storage.sample_projects = 4;

    let router = build_router(Arc::new(AppState::from_config(&config).unwrap()));
    let (_, json) = get_request(&router, "/projects").await;
    assert_eq!(json.as_array().unwrap().len(), 4);

    let (_, json) = get_request(
        &router,
        "/selectedTable?selectedTable=transaction&groupBy=year",
    )
    .await;
    let buckets = json.as_array().unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0]["Date"], "2020");
}
