// crates/server/src/main.rs
//! Stream server binary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sponge_core::{MemoryEventBus, MemoryJobStore, MemoryStateCache};
use sponge_observability::init_tracing;
use sponge_server::{create_app, init_metrics, AppState, Config};

/// How often expired cache entries are purged.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Delay between checkpoints of the simulated pipeline.
const DEMO_STEP: Duration = Duration::from_millis(400);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_format)?;
    init_metrics();

    eprintln!("\n  sponge-stream v{}\n", env!("CARGO_PKG_VERSION"));

    let cache = Arc::new(MemoryStateCache::new(config.cache_ttl()));
    let sweep_cache = Arc::clone(&cache);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = sweep_cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = sweep_cache.len(), "Expired cache entries purged");
            }
        }
    });

    let state = AppState::new(
        cache,
        Arc::new(MemoryEventBus::new()),
        Arc::new(MemoryJobStore::new()),
        config.stream_config(),
        config.demo.then_some(DEMO_STEP),
    );
    let app = create_app(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, demo = config.demo, "Stream server listening");
    eprintln!("  \u{2192} http://{}\n", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Stream server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
