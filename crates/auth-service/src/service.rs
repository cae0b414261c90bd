use common::Role;
use lazy_static::lazy_static;
use std::sync::Arc;
use telemetry::metrics::{AUTH_LOGINS, AUTH_USER_OPERATIONS};
use tracing::{info, warn};

use crate::{
    config::{AuthConfig, BootstrapAdmin},
    crypto,
    error::{ApiError, EMAIL_TAKEN, LOGIN_FAILED},
    models::*,
    store::UserStore,
};

lazy_static! {
    /// Verified against on logins for unknown emails so that they cost the
    /// same argon2 work as a wrong password.
    static ref UNKNOWN_USER_HASH: Option<String> =
        crypto::hash_password("unknown-user-placeholder").ok();
}

pub struct AuthService {
    store: Arc<dyn UserStore>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ===== Authentication =====

    pub async fn login(&self, form: LoginForm) -> Result<TokenResponse, ApiError> {
        let email = form.username.trim();

        let user = self.store.find_by_email(email).await?;

        let Some(user) = user else {
            if let Some(hash) = UNKNOWN_USER_HASH.clone() {
                check_password(form.password, hash).await;
            }
            AUTH_LOGINS.with_label_values(&["unknown_user"]).inc();
            return Err(ApiError::unauthorized(LOGIN_FAILED));
        };

        if !check_password(form.password, user.password_hash.clone()).await {
            AUTH_LOGINS.with_label_values(&["bad_password"]).inc();
            return Err(ApiError::unauthorized(LOGIN_FAILED));
        }

        let access_token = crypto::generate_jwt(
            &user.email,
            user.role,
            &self.config.jwt_secret,
            self.config.jwt_expiration_secs,
        )?;

        AUTH_LOGINS.with_label_values(&["success"]).inc();
        info!(email = %user.email, role = %user.role, "user logged in");
        Ok(TokenResponse::bearer(access_token))
    }

    /// Resolve a bearer token to the stored user. The role comes from the
    /// store, not the token.
    pub async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        let claims = crypto::verify_jwt(token, &self.config.jwt_secret).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            ApiError::credentials()
        })?;

        self.store
            .find_by_email(&claims.sub)
            .await?
            .ok_or_else(ApiError::credentials)
    }

    // ===== User Management =====

    pub async fn create_user(&self, actor: &User, req: CreateUserRequest) -> Result<UserResponse, ApiError> {
        Self::require_dmt(actor)?;

        let email = req.email.trim().to_string();
        if !is_valid_email(&email) {
            AUTH_USER_OPERATIONS.with_label_values(&["create", "invalid"]).inc();
            return Err(ApiError::bad_request("Invalid email address"));
        }
        if req.password.is_empty() {
            AUTH_USER_OPERATIONS.with_label_values(&["create", "invalid"]).inc();
            return Err(ApiError::bad_request("Password must not be empty"));
        }
        if self.store.find_by_email(&email).await?.is_some() {
            AUTH_USER_OPERATIONS.with_label_values(&["create", "duplicate"]).inc();
            return Err(ApiError::bad_request(EMAIL_TAKEN));
        }

        let password_hash = crypto::hash_password(&req.password)?;
        let user = self
            .store
            .insert(NewUser {
                email,
                password_hash,
                role: req.role,
            })
            .await?;

        AUTH_USER_OPERATIONS.with_label_values(&["create", "success"]).inc();
        info!(created = %user.email, role = %user.role, by = %actor.email, "user created");
        Ok(user.into())
    }

    pub async fn list_users(&self, actor: &User) -> Result<Vec<UserResponse>, ApiError> {
        Self::require_dmt(actor)?;
        let users = self.store.list().await?;
        AUTH_USER_OPERATIONS.with_label_values(&["list", "success"]).inc();
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    /// Create the configured dmt account unless the email already exists
    pub async fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> Result<bool, ApiError> {
        if self.store.find_by_email(&admin.email).await?.is_some() {
            return Ok(false);
        }
        let password_hash = crypto::hash_password(&admin.password)?;
        self.store
            .insert(NewUser {
                email: admin.email.clone(),
                password_hash,
                role: Role::Dmt,
            })
            .await?;
        info!(email = %admin.email, "bootstrap dmt account created");
        Ok(true)
    }

    fn require_dmt(actor: &User) -> Result<(), ApiError> {
        if actor.role != Role::Dmt {
            AUTH_USER_OPERATIONS.with_label_values(&["admin", "forbidden"]).inc();
            return Err(ApiError::not_permitted());
        }
        Ok(())
    }
}

/// Argon2 verification on the blocking pool; unreadable hashes never match
async fn check_password(password: String, hash: String) -> bool {
    let outcome = tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash)).await;
    match outcome {
        Ok(Ok(matches)) => matches,
        Ok(Err(e)) => {
            warn!(error = %e, "stored password hash is unreadable");
            false
        }
        Err(e) => {
            warn!(error = %e, "password check aborted");
            false
        }
    }
}
