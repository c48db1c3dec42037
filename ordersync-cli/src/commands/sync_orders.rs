//! Sync-orders command: run the retry/queued sync loop.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use ordersync_core::sync::{DEFAULT_BATCH_SIZE, SyncOrders, SyncOrdersRequest};
use ordersync_core::transport::HttpProcessEvents;

use crate::db;

/// Arguments for the sync-orders command.
#[derive(Debug, Args)]
pub struct SyncOrdersArgs {
    /// Restrict to these host order ids.
    #[arg(long = "order-id")]
    pub order_ids: Vec<i64>,

    /// Restrict to these stores.
    #[arg(long = "store-id")]
    pub store_ids: Vec<i64>,

    /// Orders dispatched per transport call.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: u32,

    /// Process orders of stores whose sync flag is off too.
    #[arg(long)]
    pub ignore_sync_enabled_flag: bool,

    /// Path to the target SQLite database.
    #[arg(long, env = "ORDERSYNC_DB")]
    pub db: String,

    /// Base URL of the ingestion service.
    #[arg(long, env = "ORDERSYNC_ENDPOINT")]
    pub endpoint: String,
}

/// Execute the sync-orders command.
///
/// # Errors
///
/// Returns an error for structural preconditions (no valid order ids, no
/// sync-enabled store) and for database failures. Per-order failures are
/// reported and retried on the next run.
pub async fn execute(args: SyncOrdersArgs) -> Result<()> {
    let pool = db::open_pool(&args.db).await?;
    let config = db::load_config(&pool).await?;
    let ctx = db::build_context(&pool, config);

    let transport = Arc::new(HttpProcessEvents::new(args.endpoint, ctx.config.clone())?);
    let orchestrator = SyncOrders::new(ctx, transport);

    let request = SyncOrdersRequest {
        order_ids: args.order_ids,
        store_ids: args.store_ids,
        batch_size: args.batch_size,
        ignore_sync_enabled: args.ignore_sync_enabled_flag,
        via: "CLI".to_string(),
        ..SyncOrdersRequest::default()
    };
    let report = orchestrator.execute(&request).await?;

    for line in &report.lines {
        println!("{line}");
    }
    for phase in &report.phases {
        println!(
            "{}: {} synced, {} failed ({} dispatches)",
            phase.label, phase.synced, phase.failed, phase.dispatches
        );
    }
    tracing::info!(
        synced = report.total_synced(),
        failed = report.total_failed(),
        "sync-orders finished"
    );
    Ok(())
}
