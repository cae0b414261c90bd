use axum::{
    extract::{Path, State},
    http::header,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use common::{
    auth_middleware::{auth_middleware, AuthMiddlewareConfig, RequireAuth},
    roles::Role,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{error::ApiError, models::*, state::RegistryState};

/// Registry routes. Each group is gated by the roles its bearer token must carry.
pub fn router(state: RegistryState, jwt_secret: &str) -> Router {
    let lookups = Router::new()
        .route("/vehicles/:plate", get(get_vehicle))
        .route_layer(middleware::from_fn_with_state(
            gate(jwt_secret, vec![Role::Police, Role::Dmt]),
            auth_middleware,
        ));

    let admin = Router::new()
        .route("/vehicles", post(register_vehicle))
        .route("/vehicles/:plate/renew", put(renew_licence))
        .route_layer(middleware::from_fn_with_state(
            gate(jwt_secret, vec![Role::Dmt]),
            auth_middleware,
        ));

    let authenticated = Router::new()
        .route("/vehicles/license/:licence", get(get_by_licence))
        .route("/saved-vehicles", get(list_saved))
        .route(
            "/saved-vehicles/:plate",
            post(save_vehicle).delete(unsave_vehicle),
        )
        .route_layer(middleware::from_fn_with_state(
            gate(jwt_secret, Vec::new()),
            auth_middleware,
        ));

    Router::new()
        // Health and metrics
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(lookups)
        .merge(admin)
        .merge(authenticated)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(telemetry::CorrelationIdLayer::new())
        .with_state(state)
}

/// Token check for one route group; an empty role list admits any valid token
fn gate(jwt_secret: &str, roles: Vec<Role>) -> Arc<AuthMiddlewareConfig> {
    Arc::new(AuthMiddlewareConfig::new(jwt_secret).with_roles(roles))
}

// ===== Health & Metrics =====

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let body = telemetry::metrics::encode_metrics()
        .map_err(|e| ApiError::internal(format!("failed to encode metrics: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

// ===== Vehicles =====

async fn get_vehicle(
    State(state): State<RegistryState>,
    Path(plate): Path<String>,
) -> Result<Json<VehicleResponse>, ApiError> {
    Ok(Json(state.service().get_by_plate(&plate).await?))
}

async fn get_by_licence(
    State(state): State<RegistryState>,
    Path(licence): Path<String>,
) -> Result<Json<VehicleResponse>, ApiError> {
    Ok(Json(state.service().get_by_licence(&licence).await?))
}

async fn register_vehicle(
    State(state): State<RegistryState>,
    RequireAuth(ctx): RequireAuth,
    Json(vehicle): Json<Vehicle>,
) -> Result<Json<VehicleResponse>, ApiError> {
    tracing::debug!(actor = %ctx.email, "registering vehicle");
    Ok(Json(state.service().register(vehicle).await?))
}

async fn renew_licence(
    State(state): State<RegistryState>,
    RequireAuth(ctx): RequireAuth,
    Path(plate): Path<String>,
    Json(req): Json<RenewLicenceRequest>,
) -> Result<Json<VehicleResponse>, ApiError> {
    tracing::debug!(actor = %ctx.email, plate = %plate, "renewing licence");
    Ok(Json(state.service().renew(&plate, req).await?))
}

// ===== Saved Vehicles =====

async fn list_saved(
    State(state): State<RegistryState>,
    RequireAuth(ctx): RequireAuth,
) -> Result<Json<Vec<VehicleResponse>>, ApiError> {
    Ok(Json(state.service().saved(&ctx.email).await?))
}

async fn save_vehicle(
    State(state): State<RegistryState>,
    RequireAuth(ctx): RequireAuth,
    Path(plate): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    Ok(Json(state.service().save(&ctx.email, &plate).await?))
}

async fn unsave_vehicle(
    State(state): State<RegistryState>,
    RequireAuth(ctx): RequireAuth,
    Path(plate): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    Ok(Json(state.service().unsave(&ctx.email, &plate).await?))
}
