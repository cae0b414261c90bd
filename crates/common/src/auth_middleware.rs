use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::roles::Role;

pub const CREDENTIALS_ERROR: &str = "Could not validate credentials";
pub const FORBIDDEN_ERROR: &str = "Operation not permitted";

/// JWT Claims structure matching auth-service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub sub: String, // user email
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication context passed to request handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub email: String,
    pub role: Role,
}

impl AuthContext {
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

impl From<AuthClaims> for AuthContext {
    fn from(claims: AuthClaims) -> Self {
        Self {
            email: claims.sub,
            role: claims.role,
        }
    }
}

/// Auth middleware configuration
#[derive(Clone)]
pub struct AuthMiddlewareConfig {
    pub jwt_secret: String,
    pub required_roles: Vec<Role>,
}

impl AuthMiddlewareConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            required_roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.required_roles = roles;
        self
    }
}

/// Bearer token from an `Authorization` header, if present
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    auth_str
        .strip_prefix("Bearer ")
        .or_else(|| auth_str.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn extract_token(req: &Request) -> Option<String> {
    bearer_token(req.headers()).map(str::to_string)
}

/// Verify JWT token locally with the shared secret
pub fn verify_jwt_local(token: &str, jwt_secret: &str) -> Result<AuthClaims, String> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let token_data = decode::<AuthClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| format!("Invalid JWT: {}", e))?;

    Ok(token_data.claims)
}

/// 401 carrying the bearer challenge header
pub fn unauthorized(message: &str) -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": FORBIDDEN_ERROR })),
    )
        .into_response()
}

/// Authentication middleware that verifies JWT tokens
pub async fn auth_middleware(
    State(config): State<Arc<AuthMiddlewareConfig>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token(&req).ok_or_else(|| unauthorized(CREDENTIALS_ERROR))?;

    let claims = verify_jwt_local(&token, &config.jwt_secret).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        unauthorized(CREDENTIALS_ERROR)
    })?;

    let auth_ctx = AuthContext::from(claims);

    if !config.required_roles.is_empty() && !auth_ctx.has_any_role(&config.required_roles) {
        return Err(forbidden());
    }

    req.extensions_mut().insert(auth_ctx);

    Ok(next.run(req).await)
}

/// Axum extractor for requiring authentication
/// Usage: `RequireAuth(auth_ctx): RequireAuth` in route handlers
pub struct RequireAuth(pub AuthContext);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| unauthorized(CREDENTIALS_ERROR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(role: Role, secret: &str, exp_offset: i64) -> String {
        let now = 1_700_000_000i64.max(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_secs() as i64,
        );
        let claims = AuthClaims {
            sub: "officer@gov.lk".to_string(),
            role,
            exp: now + exp_offset,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_jwt_local() {
        let token = token_for(Role::Police, "secret", 600);
        let claims = verify_jwt_local(&token, "secret").unwrap();
        assert_eq!(claims.sub, "officer@gov.lk");
        assert_eq!(claims.role, Role::Police);

        assert!(verify_jwt_local(&token, "other-secret").is_err());
        assert!(verify_jwt_local("not-a-token", "secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = token_for(Role::Dmt, "secret", -3600);
        assert!(verify_jwt_local(&token, "secret").is_err());
    }

    #[test]
    fn test_extract_token() {
        let req = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&req).as_deref(), Some("abc.def"));

        let req = Request::builder()
            .header(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
            .body(Body::empty())
            .unwrap();
        assert!(extract_token(&req).is_none());

        let req = Request::builder().body(Body::empty()).unwrap();
        assert!(extract_token(&req).is_none());
    }

    #[test]
    fn test_role_checks() {
        let ctx = AuthContext {
            email: "clerk@gov.lk".to_string(),
            role: Role::Dmt,
        };
        assert!(ctx.has_any_role(&[Role::Dmt]));
        assert!(!ctx.has_any_role(&[Role::Police]));
        assert!(ctx.has_any_role(&[Role::Police, Role::Dmt]));

        let public = AuthContext {
            email: "citizen@example.com".to_string(),
            role: Role::Public,
        };
        assert!(!public.has_any_role(&[Role::Police, Role::Dmt]));
    }

    #[test]
    fn test_unauthorized_carries_bearer_challenge() {
        let response = unauthorized(CREDENTIALS_ERROR);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
