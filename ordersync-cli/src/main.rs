//! Entry point for the `ordersync` binary.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ordersync_cli::{Cli, Commands, commands};

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::QueueOrders(args) => commands::queue_orders::execute(args).await,
            Commands::SyncOrders(args) => commands::sync_orders::execute(args).await,
            Commands::MigrateLegacy(args) => commands::migrate_legacy::execute(args).await,
        }
    })
}
