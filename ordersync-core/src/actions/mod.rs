//! Action layer: atomic state-transition operations
//!
//! One file per operation, each executing against an [`ActionContext`] and
//! producing a uniform [`ActionResult`]. Persistence failures are captured
//! into the result (message + undurable record), not propagated; the only
//! entry points that return `Err` are the ones with documented
//! invalid-argument behaviour.

mod mark_processed;
mod mark_processing;
mod process_failed;
mod queue_order;
mod update_history;

pub use mark_processed::MarkOrderAsProcessed;
pub use mark_processing::MarkOrderAsProcessing;
pub use process_failed::ProcessFailedOrderSync;
pub use queue_order::QueueOrderForSync;
pub use update_history::{HistoryUpdate, UpdateSyncOrderHistoryForOrderId};

use std::sync::Arc;

use serde_json::json;

use crate::config::ConfigProvider;
use crate::model::{AdditionalInformation, SyncOrderHistoryRecord, SyncOrderRecord};
use crate::orders::{OrderLookup, OrderRef};
use crate::repository::{SyncOrderHistoryRepository, SyncOrderRepository};
use crate::status::{ActionOutcome, HistoryAction, SyncStatus};

/// Collaborators shared by every action.
#[derive(Clone)]
pub struct ActionContext {
    pub sync_orders: Arc<dyn SyncOrderRepository>,
    pub history: Arc<dyn SyncOrderHistoryRepository>,
    pub orders: Arc<dyn OrderLookup>,
    pub config: Arc<dyn ConfigProvider>,
}

/// Uniform result of one action-layer operation.
///
/// On a persistence failure `record` reflects the *intended* new state but
/// carries no id, signalling the state was not made durable.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub success: bool,
    pub outcome: ActionOutcome,
    pub record: Option<SyncOrderRecord>,
    pub history: Option<SyncOrderHistoryRecord>,
    pub messages: Vec<String>,
}

impl ActionResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome: ActionOutcome::Noop,
            record: None,
            history: None,
            messages: vec![message.into()],
        }
    }
}

/// A sync-order record together with the status it had before the action.
///
/// `original_status` is [`SyncStatus::NotRegistered`] when the record was
/// created by this resolution.
pub(crate) struct ResolvedRecord {
    pub record: SyncOrderRecord,
    pub original_status: SyncStatus,
}

/// Resolve the host order, then load or build its sync record.
///
/// The order must exist even when a record is already present. Errors are
/// returned as display messages to be captured into a failed
/// [`ActionResult`].
pub(crate) async fn resolve_or_create(
    ctx: &ActionContext,
    order_id: i64,
) -> Result<ResolvedRecord, String> {
    let order = ctx
        .orders
        .get_order(order_id)
        .await
        .map_err(|e| format!("Unable to load order for order id {order_id}: {e}"))?
        .ok_or_else(|| format!("Order with id {order_id} does not exist"))?;

    resolve_or_create_for_order(ctx, &order).await
}

/// Variant of [`resolve_or_create`] for callers that already hold the order.
pub(crate) async fn resolve_or_create_for_order(
    ctx: &ActionContext,
    order: &OrderRef,
) -> Result<ResolvedRecord, String> {
    match ctx.sync_orders.get_by_order_id(order.id).await {
        Ok(Some(record)) => {
            let original_status = record.status;
            Ok(ResolvedRecord {
                record,
                original_status,
            })
        }
        Ok(None) => Ok(ResolvedRecord {
            record: SyncOrderRecord::new(order.id, order.store_id),
            original_status: SyncStatus::NotRegistered,
        }),
        Err(e) => Err(format!(
            "Unable to load sync record for order id {}: {e}",
            order.id
        )),
    }
}

/// Merge the conventional transition keys into caller-supplied metadata.
///
/// `original_status` renders as an empty string for a record that did not
/// exist before the action; `new_status` is present only when the status
/// actually changed.
pub(crate) fn transition_metadata(
    mut info: AdditionalInformation,
    record: &SyncOrderRecord,
    original_status: SyncStatus,
    new_status: Option<SyncStatus>,
) -> AdditionalInformation {
    let original = match original_status {
        SyncStatus::NotRegistered => "",
        other => other.as_str(),
    };
    info.insert("original_status".to_string(), json!(original));
    if let Some(status) = new_status {
        info.insert("new_status".to_string(), json!(status.as_str()));
    }
    info.insert("order_id".to_string(), json!(record.order_id));
    info.insert("store_id".to_string(), json!(record.store_id));
    info
}

/// Persist the record, degrading a save failure into result messages.
///
/// On failure the result flips to unsuccessful and the record keeps the
/// intended state with its id stripped; the caller must then skip the
/// history append (no durable owner to attach it to).
pub(crate) async fn persist_record(
    ctx: &ActionContext,
    result: &mut ActionResult,
    record: SyncOrderRecord,
) -> Option<SyncOrderRecord> {
    match ctx.sync_orders.save(&record).await {
        Ok(stored) => {
            result.record = Some(stored.clone());
            Some(stored)
        }
        Err(e) => {
            tracing::error!(
                order_id = record.order_id,
                store_id = record.store_id,
                status = %record.status,
                attempts = record.attempts,
                "failed to save sync order record: {e}"
            );
            let mut undurable = record;
            undurable.id = None;
            result.success = false;
            result.messages.push(e.to_string());
            result.record = Some(undurable);
            None
        }
    }
}

/// Append one history row for a transition attempt.
///
/// A history save failure does not flip `success` (the transition itself is
/// durable); the unsaved row is returned on the result with no id and the
/// error message is recorded.
pub(crate) async fn append_history(
    ctx: &ActionContext,
    result: &mut ActionResult,
    sync_order_id: i64,
    action: HistoryAction,
    via: &str,
    outcome: ActionOutcome,
    additional_information: AdditionalInformation,
) {
    let row = SyncOrderHistoryRecord::new(
        sync_order_id,
        action,
        via,
        outcome,
        additional_information,
    );
    match ctx.history.save(&row).await {
        Ok(stored) => result.history = Some(stored),
        Err(e) => {
            tracing::warn!(
                sync_order_id,
                action = %action,
                "failed to save sync order history record: {e}"
            );
            result.messages.push(e.to_string());
            result.history = Some(row);
        }
    }
}
