//! Pool construction and context wiring shared by the commands.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use ordersync_core::actions::ActionContext;
use ordersync_core::config::SyncConfig;
use ordersync_core::orders::SqliteOrderLookup;
use ordersync_core::repository::sqlite::{
    SqliteSyncOrderHistoryRepository, SqliteSyncOrderRepository, ensure_schema,
};

/// Open the target database with WAL mode and make sure the sync tables
/// exist.
pub async fn open_pool(db_path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
        .with_context(|| format!("invalid database path: {db_path}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .pragma("foreign_keys", "ON");

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database: {db_path}"))?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(&pool)
        .await
        .context("failed to set busy_timeout")?;

    ensure_schema(&pool).await?;
    tracing::debug!(db_path, "database connection established");
    Ok(pool)
}

/// Environment defaults merged with per-store rows from the database.
pub async fn load_config(pool: &SqlitePool) -> Result<SyncConfig> {
    let mut config = SyncConfig::from_env();
    config.load_stores(pool).await?;
    Ok(config)
}

pub fn build_context(pool: &SqlitePool, config: SyncConfig) -> ActionContext {
    ActionContext {
        sync_orders: Arc::new(SqliteSyncOrderRepository::new(pool.clone())),
        history: Arc::new(SqliteSyncOrderHistoryRepository::new(pool.clone())),
        orders: Arc::new(SqliteOrderLookup::new(pool.clone())),
        config: Arc::new(config),
    }
}
