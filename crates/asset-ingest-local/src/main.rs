mod auth;
mod config;
mod dispatch;
mod encode;
mod pipeline;
mod upload;
mod watch;

use std::sync::Arc;

use asset_ingest_core::{AssetUploader, CategoryMap};
use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch as tokio_watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use auth::{AuthSession, Credentials};
use config::Config;
use dispatch::Dispatcher;
use pipeline::Pipeline;
use upload::ContentAssetClient;
use watch::{scan_existing, DirectoryWatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let map_file = config.effective_map_file();

    info!("Starting asset-ingest-local");
    info!("  Root: {}", config.root.display());
    info!("  Category map: {}", map_file.display());
    info!("  Asset API: {}", config.api_url);
    info!("  Client ID: {}", config.client_id);
    info!(
        "  Workers: {}, settle delay: {} ms",
        config.workers, config.settle_delay_ms
    );

    let categories = Arc::new(CategoryMap::load_or_empty(&map_file));

    let session = Arc::new(AuthSession::new(
        config.auth_url.clone(),
        Credentials {
            grant_type: config.grant_type.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            account_id: config.account_id.clone(),
        },
        config.auth_timeout(),
    )?);
    if let Err(e) = session.acquire().await {
        warn!("Starting without a token, will retry on first upload: {}", e);
    }

    let uploader: Arc<dyn AssetUploader> = Arc::new(ContentAssetClient::new(
        config.api_url.clone(),
        session,
        config.upload_timeout(),
    )?);
    let pipeline = Arc::new(Pipeline::new(
        categories,
        uploader,
        config.archive_dir_name.clone(),
    ));

    let (event_tx, event_rx) = mpsc::channel(1000);
    let watcher = DirectoryWatcher::start(&config.root, event_tx.clone())?;

    if config.scan_existing {
        let dirs = watcher.directories().to_vec();
        let tx = event_tx.clone();
        tokio::spawn(async move {
            let count = scan_existing(&dirs, &tx).await;
            info!("Startup scan enqueued {} existing file(s)", count);
        });
    }
    drop(event_tx);

    let shutdown_rx = create_shutdown_signal();
    let dispatcher = Dispatcher::new(
        pipeline,
        config.settle_delay(),
        config.workers,
        config.queue_capacity,
    );

    info!(
        "Monitoring {} folder(s), waiting for new files",
        watcher.directories().len()
    );
    dispatcher.run(event_rx, shutdown_rx).await;

    drop(watcher);
    info!("Shutdown complete");
    Ok(())
}

/// Create a shutdown signal that triggers on Ctrl+C or SIGTERM.
fn create_shutdown_signal() -> tokio_watch::Receiver<bool> {
    let (tx, rx) = tokio_watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
            info!("Received Ctrl+C, initiating shutdown");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
            info!("Received SIGTERM, initiating shutdown");
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        let _ = tx.send(true);
    });

    rx
}
