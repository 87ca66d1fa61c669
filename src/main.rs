use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use threadmind::services::{default_data_dir, ConfigService};
use threadmind::{AppResult, AppState};

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let data_dir = default_data_dir()?;
    let config = ConfigService::new(&data_dir)?.load()?;
    tracing::info!(data_dir = %data_dir.display(), database = %config.database_path, "Starting threadmind");

    let state = AppState::init(config).await?;
    match state.kv.purge_expired().await {
        Ok(purged) if purged > 0 => tracing::info!(purged, "Expired cache entries removed"),
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "Cache purge failed"),
    }

    let pools = state.start_workers();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = state
        .config
        .scheduler
        .enabled
        .then(|| state.scheduler().spawn(shutdown_rx));

    tracing::info!("Running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Scheduler task failed");
        }
    }
    for pool in pools {
        pool.stop().await;
    }
    state.db.close().await;
    Ok(())
}
