//! HTTP ingress binary. Owns startup wiring (config → store → cache →
//! object store → router) and the signal-driven graceful shutdown.

use std::sync::Arc;

use res_blob::{ChunkUploadCoordinator, RedisUploadSessionStore, S3CompatibleStore};
use res_core::AppConfig;
use res_store::Store;
use res_web::AppState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(&config);

    let store = Store::connect(&config.mongodb).await?;
    let sessions = RedisUploadSessionStore::connect(&config.redis_url).await?;
    let blob_store = S3CompatibleStore::from_config(&config.s3).await;

    let uploads = Arc::new(ChunkUploadCoordinator::new(Arc::new(blob_store), Arc::new(sessions)));
    let state = AppState::new(store, uploads, config.auth.clone());
    let router = res_web::router(state);

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "ingress listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    info!("ingress shut down cleanly");
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match config.worker_logger {
        res_core::LogFormat::Json => subscriber.json().init(),
        res_core::LogFormat::Pretty => subscriber.pretty().init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl_c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => info!("received SIGTERM, starting graceful shutdown"),
    }
}
