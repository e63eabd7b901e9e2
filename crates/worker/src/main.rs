//! kiri-offline gateway entry point.
//!
//! Boots the offline cache worker through its lifecycle (install, then
//! activate) and serves the controlled scope until interrupted. Logging
//! goes to stderr as JSON.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod events;
mod gateway;
mod lifecycle;
mod request;
mod worker;

use events::WorkerEvent;
use kiri_core::{AppConfig, AssetManifest, CacheDb};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let addr: SocketAddr = config.listen_addr.parse().context("invalid listen address")?;

    let manifest = AssetManifest::from_file(&config.manifest_path).context("failed to load asset manifest")?;
    let cache = CacheDb::open(&config.db_path).await.context("failed to open cache store")?;

    let worker = Arc::new(worker::OfflineWorker::new(config, manifest, cache)?);

    // a failed install leaves any previously cached generation untouched
    worker.dispatch(WorkerEvent::Install).await?;
    worker.dispatch(WorkerEvent::Activate).await?;

    let listener = TcpListener::bind(addr).await.context("failed to bind gateway address")?;
    tracing::info!(%addr, "offline gateway listening");

    tokio::select! {
        result = gateway::serve(worker, listener) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
