//! Command implementations.

pub mod migrate_legacy;
pub mod queue_orders;
pub mod sync_orders;
