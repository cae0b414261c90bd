use axum::http::{HeaderMap, HeaderValue, Request, Response};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// HTTP header name for correlation ID
pub const X_CORRELATION_ID: &str = "x-correlation-id";

/// Accepted as a fallback when a client only sends a request id
pub const X_REQUEST_ID: &str = "x-request-id";

pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Reuse the caller's correlation id when it is a sane header value, otherwise mint one
pub fn extract_or_generate_correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(X_CORRELATION_ID)
        .or_else(|| headers.get(X_REQUEST_ID))
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(generate_correlation_id)
}

/// Correlation ID stored in request extensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tags every request with a correlation id: request extension, tracing span
/// field and `x-correlation-id` response header.
#[derive(Clone, Default)]
pub struct CorrelationIdLayer;

impl CorrelationIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdService { inner }
    }
}

#[derive(Clone)]
pub struct CorrelationIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let correlation_id = extract_or_generate_correlation_id(req.headers());
        req.extensions_mut()
            .insert(CorrelationId(correlation_id.clone()));

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        let fut = self.inner.call(req);
        Box::pin(
            async move {
                let mut response = fut.await?;
                if let Ok(value) = HeaderValue::from_str(&correlation_id) {
                    response.headers_mut().insert(X_CORRELATION_ID, value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}
