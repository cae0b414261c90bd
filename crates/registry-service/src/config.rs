use anyhow::{Context, Result};
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub bind_addr: SocketAddr,
    /// Postgres URL; when unset the registry is kept in memory
    pub database_url: Option<String>,
    /// Must match the auth service's secret
    pub jwt_secret: String,
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("REGISTRY_SERVICE_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8002".to_string())
            .parse()
            .context("invalid REGISTRY_SERVICE_ADDR")?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using default (INSECURE for production!)");
            "default-jwt-secret-CHANGE-IN-PRODUCTION".to_string()
        });

        Ok(Self {
            bind_addr,
            database_url,
            jwt_secret,
        })
    }
}
