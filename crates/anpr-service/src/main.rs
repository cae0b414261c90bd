use anpr_service::{api, build_onnx_pipeline, AnprConfig, AnprState};
use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = telemetry::init_with_service("anpr-service");

    info!("Starting ANPR Service...");

    let config = AnprConfig::from_env()?;
    info!(
        bind = %config.bind_addr,
        node_id = %config.node_id,
        detector = %config.detector.model_path,
        reader = %config.reader.model_path,
        provider = %config.detector.runtime.execution_provider,
        "ANPR service configuration"
    );

    let loader_config = config.clone();
    let state = match tokio::task::spawn_blocking(move || build_onnx_pipeline(&loader_config)).await? {
        Ok(pipeline) => {
            info!("Recognition models loaded");
            AnprState::new(config.node_id.clone(), pipeline)
        }
        Err(e) => {
            error!(error = format!("{e:#}"), "Failed to load recognition models; serving without them");
            AnprState::without_models(config.node_id.clone())
        }
    };

    let app = api::router(state, config.max_upload_bytes);

    info!("Binding to {}", config.bind_addr);
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("ANPR Service listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ANPR Service stopped");
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
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
