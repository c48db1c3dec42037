//! Order sync lifecycle tracking
//!
//! Tracks the synchronization of e-commerce orders to an external
//! analytics/search ingestion service: a per-order state machine with
//! bounded retries, an append-only transition history, a batch
//! orchestrator that drains the pickup-eligible pool, and a one-time
//! migration from the legacy send-flag table.
//!
//! The host platform's order model, configuration and the ingestion
//! transport are reached through narrow traits ([`orders::OrderLookup`],
//! [`config::ConfigProvider`], [`transport::ProcessEvents`]) so the crate
//! stays independent of the surrounding commerce stack.

pub mod actions;
pub mod config;
pub mod error;
pub mod migrate;
pub mod model;
pub mod orders;
pub mod repository;
pub mod status;
pub mod sync;
pub mod testing;
pub mod transport;

// Re-exports for the common wiring path
pub use actions::{
    ActionContext, ActionResult, MarkOrderAsProcessed, MarkOrderAsProcessing,
    ProcessFailedOrderSync, QueueOrderForSync, UpdateSyncOrderHistoryForOrderId,
};
pub use config::{ConfigProvider, StoreSettings, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use migrate::MigrateLegacyOrderSyncRecords;
pub use model::{SyncOrderHistoryRecord, SyncOrderRecord};
pub use repository::{SyncOrderHistoryRepository, SyncOrderQuery, SyncOrderRepository};
pub use status::{ActionOutcome, HistoryAction, SyncStatus};
pub use sync::{SyncOrders, SyncOrdersReport, SyncOrdersRequest};
