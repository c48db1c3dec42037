//! Migrate-legacy command: fold legacy per-item send flags into sync
//! records.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use ordersync_core::migrate::{MigrateLegacyOrderSyncRecords, SqliteLegacySendFlagReader};

use crate::db;

/// Arguments for the migrate-legacy command.
#[derive(Debug, Args)]
pub struct MigrateLegacyArgs {
    /// Migrate a single store instead of every integrated store.
    #[arg(long = "store-id")]
    pub store_id: Option<i64>,

    /// Path to the target SQLite database.
    #[arg(long, env = "ORDERSYNC_DB")]
    pub db: String,
}

/// Execute the migrate-legacy command.
///
/// # Errors
///
/// Returns an error for database failures; per-order migration failures
/// are logged and the run continues.
pub async fn execute(args: MigrateLegacyArgs) -> Result<()> {
    let pool = db::open_pool(&args.db).await?;
    let config = db::load_config(&pool).await?;
    let ctx = db::build_context(&pool, config);

    let legacy = Arc::new(SqliteLegacySendFlagReader::new(pool.clone()));
    let migration = MigrateLegacyOrderSyncRecords::new(ctx, legacy);
    let report = migration.execute(args.store_id).await?;

    for group in &report.groups {
        println!(
            "Migrated {} orders for stores {:?} ({} failures) in {}ms",
            group.orders_processed,
            group.store_ids,
            group.failures,
            group.elapsed.as_millis()
        );
    }
    println!("Migration complete: {} orders", report.total_orders());
    Ok(())
}
