use std::{path::Path, str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use super::{DbPool, MIGRATOR};
use crate::error::AppResult;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const MAX_CONNECTIONS_CAP: u32 = 64;

/// Connections for `pools` worker pools of `concurrency` slots each, plus one
/// claim loop per pool and two for the request path.
pub fn connections_for_workers(pools: usize, concurrency: usize) -> u32 {
    let wanted = pools
        .saturating_mul(concurrency.saturating_add(1))
        .saturating_add(2);
    u32::try_from(wanted)
        .unwrap_or(MAX_CONNECTIONS_CAP)
        .clamp(DEFAULT_MAX_CONNECTIONS, MAX_CONNECTIONS_CAP)
}

/// Opens (creating if needed) the SQLite database and runs pending migrations.
pub async fn init_pool(db_path: impl AsRef<Path>) -> AppResult<DbPool> {
    init_pool_sized(db_path, DEFAULT_MAX_CONNECTIONS).await
}

pub async fn init_pool_sized(db_path: impl AsRef<Path>, max_connections: u32) -> AppResult<DbPool> {
    let db_url = format!("sqlite://{}", db_path.as_ref().to_string_lossy());

    // WAL lets the request path read while workers write. Claims and settles
    // are short single-statement writes, so a few seconds of busy wait covers
    // contention between pools.
    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;

    tracing::debug!(
        path = %db_path.as_ref().display(),
        max_connections,
        "database ready"
    );
    Ok(pool)
}
