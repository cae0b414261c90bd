use anyhow::{Context, Result};
use registry_service::{
    MemoryVehicleStore, PgVehicleStore, RegistryConfig, RegistryService, RegistryState,
    VehicleStore,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = telemetry::init_with_service("registry-service");

    let config = RegistryConfig::from_env()?;

    let store: Arc<dyn VehicleStore> = match &config.database_url {
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

            Arc::new(PgVehicleStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, vehicles are kept in memory and lost on restart");
            Arc::new(MemoryVehicleStore::new())
        }
    };

    let state = RegistryState::new(Arc::new(RegistryService::new(store)));
    let app = registry_service::routes::router(state, &config.jwt_secret);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "registry-service listening");

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

    info!("shutting down");
}
