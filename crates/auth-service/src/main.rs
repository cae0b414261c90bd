use anyhow::{Context, Result};
use auth_service::{AuthConfig, AuthService, AuthState, MemoryUserStore, PgUserStore, UserStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = telemetry::init_with_service("auth-service");

    let config = AuthConfig::from_env()?;
    let bind_addr = config.bind_addr;

    let store: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("failed to connect to database")?;

            info!("running database migrations");
            let mut migrator = sqlx::migrate!("./migrations");
            migrator
                .set_ignore_missing(true)
                .run(&pool)
                .await
                .context("failed to run migrations")?;

            Arc::new(PgUserStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, users are kept in memory and lost on restart");
            Arc::new(MemoryUserStore::new())
        }
    };

    let service = Arc::new(AuthService::new(store, config.clone()));

    if let Some(admin) = &config.bootstrap_admin {
        service
            .bootstrap_admin(admin)
            .await
            .map_err(|e| anyhow::anyhow!("failed to seed bootstrap admin: {e}"))?;
    }

    let state = AuthState::new(service);

    let app = auth_service::routes::router(state);
    let listener = TcpListener::bind(bind_addr).await?;

    info!(
        addr = %bind_addr,
        token_lifetime_secs = config.jwt_expiration_secs,
        "auth-service listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, starting graceful shutdown");
}
