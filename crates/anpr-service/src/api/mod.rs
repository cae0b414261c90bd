pub mod routes;

use crate::state::AnprState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use telemetry::CorrelationIdLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the API router. `max_upload_bytes` caps request bodies.
pub fn router(state: AnprState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Health and metrics endpoints
        .route("/healthz", get(routes::healthz))
        .route("/readyz", get(routes::readyz))
        .route("/metrics", get(routes::metrics))
        // Recognition endpoints
        .route("/recognize-plate", post(routes::recognize_plate))
        .route("/recognize-plate/best", post(routes::recognize_plate_best))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CorrelationIdLayer::new())
        .with_state(state)
}
