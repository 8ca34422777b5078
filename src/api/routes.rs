use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::resolver::CountryResolver;

use super::handlers::{export_metrics, health_check, locate_client, AppState};

pub fn create_router(resolver: CountryResolver, client_ip_header: &str) -> Router {
    let state = Arc::new(AppState {
        resolver,
        client_ip_header: client_ip_header.to_lowercase(),
    });

    Router::new()
        .route("/", get(locate_client))
        .route("/metrics", get(export_metrics))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
