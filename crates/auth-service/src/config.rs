use anyhow::{Context, Result};
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub bind_addr: SocketAddr,
    /// Postgres URL; when unset users live in memory for the life of the process
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration_secs: i64,
    /// Seed a dmt account at start-up when both are set
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("AUTH_SERVICE_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8001".to_string())
            .parse()
            .context("invalid AUTH_SERVICE_ADDR")?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using default (INSECURE for production!)");
            "default-jwt-secret-CHANGE-IN-PRODUCTION".to_string()
        });

        let jwt_expiration_secs = match std::env::var("JWT_EXPIRATION_SECS") {
            Ok(v) => v.parse().context("invalid JWT_EXPIRATION_SECS")?,
            Err(_) => 30 * 60,
        };

        let bootstrap_admin = match (
            std::env::var("BOOTSTRAP_ADMIN_EMAIL"),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin {
                    email: email.trim().to_string(),
                    password,
                })
            }
            _ => None,
        };

        Ok(Self {
            bind_addr,
            database_url,
            jwt_secret,
            jwt_expiration_secs,
            bootstrap_admin,
        })
    }

    /// Defaults suitable for tests: in-memory store, fixed secret
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: None,
            jwt_secret: jwt_secret.into(),
            jwt_expiration_secs: 30 * 60,
            bootstrap_admin: None,
        }
    }
}
