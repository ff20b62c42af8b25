//! Worker binary: declares bus topology, then runs the outbox dispatcher's
//! two timers and the task processor's consumer loop side by side until a
//! termination signal arrives.

use std::sync::Arc;

use lapin::{Connection, ConnectionProperties};
use res_blob::S3CompatibleStore;
use res_bus::{topology, OutboxDispatcher, TaskProcessor};
use res_core::AppConfig;
use res_store::Store;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(&config);

    let store = Store::connect(&config.mongodb).await?;
    let blob_store: Arc<dyn res_blob::BlobStore> = Arc::new(S3CompatibleStore::from_config(&config.s3).await);

    let connection = Connection::connect(&config.rabbitmq_url, ConnectionProperties::default()).await?;
    let dispatcher_channel = connection.create_channel().await?;
    let processor_channel = connection.create_channel().await?;

    topology::declare(&dispatcher_channel).await?;

    let worker_id = stable_worker_id();
    info!(%worker_id, "worker starting");

    let dispatcher = OutboxDispatcher::new(dispatcher_channel, store.clone(), worker_id.clone()).spawn();
    let processor = TaskProcessor::new(processor_channel, store, blob_store, worker_id).spawn();

    shutdown_signal().await;
    info!("shutdown signal received, draining in-flight work");

    dispatcher.shutdown().await;
    processor.shutdown().await;
    connection.close(200, "worker shutdown").await?;

    info!("worker shut down cleanly");
    Ok(())
}

/// A stable claim-lease identity for this process: `<host>-<pid>`, per the
/// dispatcher's worker identity contract (§4.2).
fn stable_worker_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string());
    format!("{host}-{}", std::process::id())
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
