use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::recognition::RecognitionError;

pub const MODELS_NOT_LOADED: &str = "models are not loaded";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Internal(msg)
            | ApiError::Timeout(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<RecognitionError> for ApiError {
    fn from(err: RecognitionError) -> Self {
        match err {
            RecognitionError::InvalidInput(msg) => ApiError::BadRequest(msg),
            e @ RecognitionError::Model(_) => ApiError::Internal(e.to_string()),
            e @ RecognitionError::Timeout { .. } => ApiError::Timeout(e.to_string()),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::Stage;

    #[test]
    fn test_recognition_error_mapping() {
        let e: ApiError = RecognitionError::InvalidInput("cannot decode image".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e: ApiError = RecognitionError::Model("session failed".into()).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let e: ApiError = RecognitionError::Timeout {
            stage: Stage::Detect,
            after_ms: 100,
        }
        .into();
        assert_eq!(e.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(e.message(), "detect stage timed out after 100 ms");
    }
}
