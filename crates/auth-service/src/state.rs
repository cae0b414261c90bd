use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::{error::ApiError, models::User, service::AuthService};

#[derive(Clone)]
pub struct AuthState {
    service: Arc<AuthService>,
}

impl AuthState {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &AuthService {
        &self.service
    }
}

/// The user behind the request's bearer token, loaded from the store
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AuthState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AuthState) -> Result<Self, Self::Rejection> {
        let token = common::auth_middleware::bearer_token(&parts.headers).ok_or_else(ApiError::credentials)?;
        state.service().current_user(token).await.map(CurrentUser)
    }
}
