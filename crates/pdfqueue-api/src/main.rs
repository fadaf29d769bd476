use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use pdfqueue_api::config::ApiConfig;
use pdfqueue_api::handlers::LogOnly;
use pdfqueue_api::{build_app, observability};
use pdfqueue_core::QueueBuilder;
use pdfqueue_core::impls::{InMemoryStore, SledStore};
use pdfqueue_core::ports::RecordStore;
use pdfqueue_core::typed::{CleanupPdfs, CreatePdf, Function, SendNotification};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;

    let store: Arc<dyn RecordStore> = match &config.db_path {
        Some(path) => Arc::new(
            SledStore::open(path).with_context(|| format!("failed to open queue store at {}", path.display()))?,
        ),
        None => {
            warn!("PDFQUEUE_DB_PATH not set; queued tasks are lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    let runtime = QueueBuilder::new()
        .register::<CreatePdf, _>(LogOnly)?
        .register::<SendNotification, _>(LogOnly)?
        .register::<CleanupPdfs, _>(LogOnly)?
        .expect_functions(&[CreatePdf::NAME, SendNotification::NAME, CleanupPdfs::NAME])
        .config(config.queue.clone())
        .store(store)
        .build()?;

    // work left behind by a previous process
    runtime.dispatcher().dispatch();

    let app = build_app(runtime.control(), config.tokens.clone());
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    runtime.shutdown().await;
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
