//! Persistent record types
//!
//! `SyncOrderRecord` tracks one order's sync lifecycle; at most one exists
//! per order id. `SyncOrderHistoryRecord` is an append-only audit trail of
//! every transition attempt, no-ops included.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::{ActionOutcome, HistoryAction, SyncStatus};

/// Open key/value metadata carried on a history row.
///
/// Conventional keys: `original_status`, `new_status`, `order_id`,
/// `store_id`, `reason`, plus anything the caller supplies.
pub type AdditionalInformation = Map<String, Value>;

/// One order's sync lifecycle record.
///
/// Created lazily the first time an order is queued or marked processing;
/// never deleted in normal operation. `id` is `None` until the first
/// successful save — a returned record with `id: None` after an action
/// signals the intended state was not made durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOrderRecord {
    /// Surrogate key, assigned on first persist.
    pub id: Option<i64>,
    /// External order entity id, unique across records.
    pub order_id: i64,
    /// Store the order belongs to.
    pub store_id: i64,
    pub status: SyncStatus,
    /// Count of processing-start or failed-retry events.
    pub attempts: i32,
}

impl SyncOrderRecord {
    /// Fresh, unsaved record for an order that has never been registered.
    ///
    /// New records start in `Queued` with zero attempts; the creating action
    /// assigns the real status before the first save.
    pub fn new(order_id: i64, store_id: i64) -> Self {
        Self {
            id: None,
            order_id,
            store_id,
            status: SyncStatus::Queued,
            attempts: 0,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }
}

/// Append-only audit row for one transition attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOrderHistoryRecord {
    /// Surrogate key, assigned on first persist.
    pub id: Option<i64>,
    /// Owning [`SyncOrderRecord`] id.
    pub sync_order_id: i64,
    /// Server-assigned creation time.
    pub created_at: DateTime<Utc>,
    pub action: HistoryAction,
    /// Free-text origin label, e.g. "Cron", "CLI", "Database Migration".
    pub via: String,
    pub result: ActionOutcome,
    pub additional_information: AdditionalInformation,
}

impl SyncOrderHistoryRecord {
    pub fn new(
        sync_order_id: i64,
        action: HistoryAction,
        via: impl Into<String>,
        result: ActionOutcome,
        additional_information: AdditionalInformation,
    ) -> Self {
        Self {
            id: None,
            sync_order_id,
            created_at: Utc::now(),
            action,
            via: via.into(),
            result,
            additional_information,
        }
    }
}
