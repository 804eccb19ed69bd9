//! precache server entry point.
//!
//! Boots the MCP server on stdio transport with one worker built from the
//! layered configuration. Logging goes to stderr to avoid interfering with
//! the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use precache_client::{FetchClient, FetchConfig, Worker};
use precache_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod host;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let worker_config = config.worker().context("invalid configuration")?;

    tracing::info!(
        cache = %worker_config.cache_name,
        scope = %worker_config.scope,
        db = %config.db_path.display(),
        "Starting precache server on stdio transport"
    );

    let store = Arc::new(CacheDb::open(&config.db_path).await?);
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let host = Arc::new(host::ClientRegistry::with_clients(1));
    let worker = Arc::new(Worker::restore(worker_config, store.clone(), fetcher, host.clone()).await?);

    let handler = handler::PrecacheServer::new(worker, store, host);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
