use crate::{
    error::ApiError,
    recognition::{Recognition, SelectionPolicy},
    state::AnprState,
};
use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct RecognizeQuery {
    pub policy: Option<String>,
}

impl RecognizeQuery {
    fn policy(&self) -> Result<SelectionPolicy, ApiError> {
        match self.policy.as_deref() {
            None => Ok(SelectionPolicy::default()),
            Some(raw) => raw.parse().map_err(ApiError::bad_request),
        }
    }
}

/// Pull the bytes of the `file` field out of a multipart body
async fn read_upload(mut multipart: Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            return Ok(field.bytes().await?);
        }
    }
    Err(ApiError::bad_request(format!(
        "multipart field '{UPLOAD_FIELD}' is required"
    )))
}

/// Recognize plates; `?policy=` selects concatenate (default) or best_match
pub async fn recognize_plate(
    State(state): State<AnprState>,
    Query(query): Query<RecognizeQuery>,
    multipart: Multipart,
) -> Result<Json<Recognition>, ApiError> {
    let policy = query.policy()?;
    let bytes = read_upload(multipart).await?;
    tracing::debug!(policy = %policy, bytes = bytes.len(), "received upload");
    Ok(Json(state.recognize(&bytes, policy).await?))
}

/// Best-match recognition regardless of query parameters
pub async fn recognize_plate_best(
    State(state): State<AnprState>,
    multipart: Multipart,
) -> Result<Json<Recognition>, ApiError> {
    let bytes = read_upload(multipart).await?;
    Ok(Json(state.recognize(&bytes, SelectionPolicy::BestMatch).await?))
}

/// Health check endpoint
pub async fn healthz(State(state): State<AnprState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "anpr-service",
            "node_id": state.node_id(),
        })),
    )
}

/// Ready only when both models are loaded
pub async fn readyz(State(state): State<AnprState>) -> impl IntoResponse {
    match state.pipeline() {
        Some(pipeline) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "detector": pipeline.detector_name(),
                "reader": pipeline.reader_name(),
                "plate_pattern": pipeline.selector().shape().pattern(),
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "reason": crate::error::MODELS_NOT_LOADED,
            })),
        ),
    }
}

/// Prometheus metrics endpoint
pub async fn metrics() -> impl IntoResponse {
    match telemetry::metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}
