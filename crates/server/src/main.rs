use std::time::Duration;

use anyhow::Context;
use db::DBService;
use server::{AppState, routes};
use services::services::{
    config::Config,
    database_validator::DatabaseValidator,
    write_cache::{CacheSyncService, LocalWriteCache},
};
use tracing::{info, warn};
use utils::logging::init_tracing;

const VENDOR_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    let validation = DatabaseValidator::new(db.pool.clone()).validate().await?;
    if validation.is_ok() {
        info!("{}", validation.summary());
    } else {
        warn!("{}", validation.summary());
    }

    let (write_cache, cache_events) = LocalWriteCache::open(Some(config.cache_dir.as_path()))
        .await
        .context("failed to open local write cache")?;
    let _sync = CacheSyncService::spawn(
        db.pool.clone(),
        write_cache.clone(),
        cache_events,
        config.cache_sync_interval,
    );

    let http = reqwest::Client::builder()
        .timeout(VENDOR_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let listen_addr = config.listen_addr;
    let state = AppState::new(db, config, http, write_cache);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
