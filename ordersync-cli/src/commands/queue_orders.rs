//! Queue-orders command: register host orders for sync.

use std::collections::HashSet;
use std::str::FromStr;

use anyhow::Result;
use clap::Args;

use ordersync_core::error::SyncError;
use ordersync_core::status::SyncStatus;
use ordersync_core::QueueOrderForSync;

use crate::db;

/// Arguments for the queue-orders command.
#[derive(Debug, Args)]
pub struct QueueOrdersArgs {
    /// Queue only these host order ids (takes precedence over store
    /// selection).
    #[arg(long = "order-id")]
    pub order_ids: Vec<i64>,

    /// Restrict to orders of these stores; defaults to every integrated
    /// store.
    #[arg(long = "store-id")]
    pub store_ids: Vec<i64>,

    /// Only (re)queue orders whose current sync status matches, e.g.
    /// "error" or "not_registered".
    #[arg(long = "sync-status")]
    pub sync_statuses: Vec<String>,

    /// Queue orders of stores whose sync flag is off too.
    #[arg(long)]
    pub ignore_sync_enabled_flag: bool,

    /// Path to the target SQLite database.
    #[arg(long, env = "ORDERSYNC_DB")]
    pub db: String,
}

/// Execute the queue-orders command.
///
/// # Errors
///
/// Returns an error when no valid order ids remain after filtering or when
/// no selected store has sync enabled. Per-order queue failures are printed
/// and do not fail the run.
pub async fn execute(args: QueueOrdersArgs) -> Result<()> {
    let statuses = parse_statuses(&args.sync_statuses)?;

    let pool = db::open_pool(&args.db).await?;
    let config = db::load_config(&pool).await?;
    let ctx = db::build_context(&pool, config);

    let candidates = select_candidates(&args, &ctx).await?;

    let mut queued = 0usize;
    let mut failed = 0usize;
    for order_id in candidates {
        if !statuses.is_empty() {
            let current = match ctx.sync_orders.get_by_order_id(order_id).await? {
                Some(record) => record.status,
                None => SyncStatus::NotRegistered,
            };
            if !statuses.contains(&current) {
                continue;
            }
        }

        let result = QueueOrderForSync::new(order_id).via("CLI").execute(&ctx).await;
        if result.success {
            queued += 1;
            println!("Queueing order id #{order_id}: OK");
        } else {
            failed += 1;
            let message = result
                .messages
                .first()
                .map(String::as_str)
                .unwrap_or("queueing failed");
            println!("Queueing order id #{order_id}: ERROR {message}");
        }
    }

    tracing::info!(queued, failed, "queue-orders finished");
    Ok(())
}

fn parse_statuses(raw: &[String]) -> Result<Vec<SyncStatus>> {
    raw.iter()
        .map(|s| SyncStatus::from_str(s).map_err(anyhow::Error::from))
        .collect()
}

async fn select_candidates(
    args: &QueueOrdersArgs,
    ctx: &ordersync_core::ActionContext,
) -> Result<Vec<i64>> {
    if !args.order_ids.is_empty() {
        let valid: Vec<i64> = args.order_ids.iter().copied().filter(|id| *id > 0).collect();
        if valid.is_empty() {
            return Err(SyncError::NoValidOrderIds.into());
        }
        return Ok(valid);
    }

    let mut store_ids = if args.store_ids.is_empty() {
        ctx.config.integrated_stores()
    } else {
        args.store_ids.clone()
    };
    if !args.ignore_sync_enabled_flag {
        store_ids.retain(|store_id| ctx.config.sync_enabled(*store_id));
    }
    if store_ids.is_empty() {
        return Err(SyncError::NoStoresEnabled.into());
    }

    let mut excluded: HashSet<String> = HashSet::new();
    for store_id in &store_ids {
        excluded.extend(ctx.config.excluded_statuses(*store_id));
    }

    let candidates = ctx.orders.order_ids_for_stores(&store_ids, &excluded).await?;
    if candidates.is_empty() {
        return Err(SyncError::NoValidOrderIds.into());
    }
    Ok(candidates)
}
