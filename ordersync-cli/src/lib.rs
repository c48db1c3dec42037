//! # ordersync-cli
//!
//! Command-line interface for the order sync engine.
//!
//! ## Commands
//!
//! - `ordersync queue-orders` - Register host orders for sync
//! - `ordersync sync-orders` - Run the retry/queued sync loop
//! - `ordersync migrate-legacy` - Migrate legacy per-item send flags
//!
//! ## Configuration
//!
//! Global knobs come from environment variables (`ORDERSYNC_MAX_ATTEMPTS`,
//! `ORDERSYNC_IP_ADDRESS_ATTRIBUTE`); per-store settings are read from the
//! `sync_store_config` table in the target database.

pub mod commands;
pub mod db;

use clap::{Parser, Subcommand};

/// Order sync command-line interface.
#[derive(Debug, Parser)]
#[command(name = "ordersync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register host orders for sync.
    QueueOrders(commands::queue_orders::QueueOrdersArgs),
    /// Run the sync loop against the ingestion endpoint.
    SyncOrders(commands::sync_orders::SyncOrdersArgs),
    /// Migrate legacy per-item send flags into sync records.
    MigrateLegacy(commands::migrate_legacy::MigrateLegacyArgs),
}
