//! Origin validation middleware

use super::types::ApiError;
use super::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Reject requests that do not come from the configured origin
///
/// Without a configured origin every request passes. Otherwise a request
/// with no `Origin` header gets 401 and one from another origin gets 403.
pub async fn validate_origin(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(required) = state.required_origin.as_deref() else {
        return next.run(request).await;
    };

    let origin = match request.headers().get(header::ORIGIN) {
        Some(value) => value.to_str().unwrap_or_default(),
        None => {
            debug!(path = %request.uri().path(), "Rejected request without Origin header");
            return ApiError::new(
                StatusCode::UNAUTHORIZED,
                "MISSING_ORIGIN",
                "request has no Origin header",
            )
            .into_response();
        },
    };

    if normalize(origin) != normalize(required) {
        debug!(origin = %origin, "Rejected request from foreign origin");
        return ApiError::new(
            StatusCode::FORBIDDEN,
            "FORBIDDEN_ORIGIN",
            format!("origin {} is not allowed", origin),
        )
        .into_response();
    }

    next.run(request).await
}

fn normalize(origin: &str) -> &str {
    origin.trim().trim_end_matches('/')
}
