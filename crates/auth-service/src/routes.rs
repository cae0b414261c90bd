use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::ApiError,
    models::*,
    state::{AuthState, CurrentUser},
};

pub fn router(state: AuthState) -> Router {
    Router::new()
        // Health and metrics
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        // Authentication
        .route("/login", post(login))
        // Users
        .route("/users/me", get(read_me))
        .route("/users/create", post(create_user))
        .route("/users", get(list_users))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(telemetry::CorrelationIdLayer::new())
        .with_state(state)
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

// ===== Authentication =====

async fn login(
    State(state): State<AuthState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let response = state.service().login(form).await?;
    Ok(Json(response))
}

// ===== User Management =====

async fn read_me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

async fn create_user(
    State(state): State<AuthState>,
    CurrentUser(actor): CurrentUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.service().create_user(&actor, req).await?;
    Ok(Json(user))
}

async fn list_users(
    State(state): State<AuthState>,
    CurrentUser(actor): CurrentUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.service().list_users(&actor).await?;
    Ok(Json(users))
}
