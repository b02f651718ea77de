use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};

use object_gateway::config::Config;
use object_gateway::services::bucket::ensure_bucket;
use object_gateway::{create_router, storage, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (.env is honoured)
    let config = Config::from_env().context("Failed to load configuration")?;

    shared::observability::init_logging(config.log_config())
        .context("Failed to initialize logging")?;

    info!("Starting Object Gateway...");

    let store = storage::connect(&config.storage)
        .await
        .context("Failed to initialize storage client")?;

    // Refuse to serve traffic without a bucket
    ensure_bucket(store.as_ref())
        .await
        .with_context(|| format!("Failed to ensure bucket '{}'", config.storage.bucket))?;

    let addr = config.bind_address();
    let base_path = config.server.base_path.clone();
    let app = create_router(AppState::new(store, config));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Object Gateway listening on {} (routes under {})", addr, base_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Object Gateway shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received, draining in-flight requests");
}
