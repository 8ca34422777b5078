use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::models::{CountryResponse, ErrorResponse};
use crate::resolver::{CountryResolver, ResolveError};

/// Route label used for every metric of the lookup endpoint.
pub const ROOT_ROUTE: &str = "/";

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub struct AppState {
    pub resolver: CountryResolver,
    /// Lowercase header name the upstream proxy writes the client address to
    pub client_ip_header: String,
}

impl ResolveError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResolveError::BadAddress => StatusCode::BAD_REQUEST,
            ResolveError::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// Resolve the country of the client named by the trusted proxy header
pub async fn locate_client(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let started = Instant::now();

    // A header that is not valid UTF-8 cannot hold an address.
    let candidate = headers
        .get(state.client_ip_header.as_str())
        .and_then(|value| value.to_str().ok());

    let response = match state.resolver.resolve(ROOT_ROUTE, candidate).await {
        Ok(country) => (StatusCode::OK, Json(CountryResponse { country })).into_response(),
        Err(err) => err.into_response(),
    };

    let metrics = state.resolver.metrics();
    metrics.inc_request(ROOT_ROUTE, response.status().as_u16());
    metrics.observe_latency(ROOT_ROUTE, started.elapsed().as_secs_f64());

    response
}

/// Prometheus scrape endpoint
pub async fn export_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        state.resolver.metrics().export(),
    )
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: &'static str,
    }

    Json(HealthResponse { status: "OK" })
}
