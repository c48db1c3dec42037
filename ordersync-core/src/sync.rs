//! Batch orchestrator: the sync loop
//!
//! Selects pickup-eligible sync records, dispatches them through the
//! transport in bounded chunks, and applies the action layer per item. Runs
//! two sequential phases so retries get priority over fresh queue entries,
//! and guards against stuck selections that stop making forward progress.

use std::collections::HashMap;
use std::sync::Arc;

use crate::actions::{ActionContext, MarkOrderAsProcessed, ProcessFailedOrderSync};
use crate::error::{SyncError, SyncResult};
use crate::model::SyncOrderRecord;
use crate::orders::OrderRef;
use crate::repository::SyncOrderQuery;
use crate::status::SyncStatus;
use crate::transport::{ProcessEvents, Verdict};

/// Orders dispatched per transport call when the caller does not say.
pub const DEFAULT_BATCH_SIZE: u32 = 250;

/// Hard cap on selection rounds per phase; a phase normally terminates via
/// the No-Action or stuck-batch guards well before this.
pub const MAX_PHASE_ITERATIONS: usize = 1000;

const RETRY_PHASE: &str = "Processing RETRY orders";
const QUEUED_PHASE: &str = "Processing QUEUED orders";

/// Parameters of one orchestrator run.
#[derive(Debug, Clone)]
pub struct SyncOrdersRequest {
    /// Restrict to these order ids; empty means no restriction.
    pub order_ids: Vec<i64>,
    /// Restrict to these store ids; empty means no restriction.
    pub store_ids: Vec<i64>,
    /// Restrict to these statuses; empty means the pickup-eligible set.
    pub statuses: Vec<SyncStatus>,
    pub batch_size: u32,
    /// Process orders of stores whose sync flag is off too.
    pub ignore_sync_enabled: bool,
    /// Origin label recorded in history rows, e.g. "Cron".
    pub via: String,
}

impl Default for SyncOrdersRequest {
    fn default() -> Self {
        Self {
            order_ids: Vec::new(),
            store_ids: Vec::new(),
            statuses: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            ignore_sync_enabled: false,
            via: "Cron".to_string(),
        }
    }
}

/// Outcome of one phase.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub label: &'static str,
    /// Selection rounds, including the terminating No-Action round.
    pub batches: usize,
    /// Transport calls issued.
    pub dispatches: usize,
    pub synced: usize,
    pub failed: usize,
    /// Phase ended via the identical-selection guard rather than No Action.
    pub stuck: bool,
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, Default)]
pub struct SyncOrdersReport {
    pub phases: Vec<PhaseReport>,
    /// Human-readable per-order status lines.
    pub lines: Vec<String>,
}

impl SyncOrdersReport {
    pub fn total_synced(&self) -> usize {
        self.phases.iter().map(|p| p.synced).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.phases.iter().map(|p| p.failed).sum()
    }
}

/// The sync-loop orchestrator.
pub struct SyncOrders {
    ctx: ActionContext,
    transport: Arc<dyn ProcessEvents>,
}

impl SyncOrders {
    pub fn new(ctx: ActionContext, transport: Arc<dyn ProcessEvents>) -> Self {
        Self { ctx, transport }
    }

    /// Run both phases. Per-order failures are recorded in the report;
    /// only structural preconditions abort the run.
    pub async fn execute(&self, request: &SyncOrdersRequest) -> SyncResult<SyncOrdersReport> {
        let order_ids = self.validate_order_ids(&request.order_ids)?;
        let store_ids = self.validate_store_ids(request)?;

        let requested: Vec<SyncStatus> = if request.statuses.is_empty() {
            vec![SyncStatus::Queued, SyncStatus::Retry, SyncStatus::Partial]
        } else {
            request.statuses.clone()
        };

        let mut report = SyncOrdersReport::default();

        // Retries first, then the general queue (Partial re-entries ride
        // with the queued phase).
        let phase_statuses = [
            (RETRY_PHASE, vec![SyncStatus::Retry]),
            (QUEUED_PHASE, vec![SyncStatus::Queued, SyncStatus::Partial]),
        ];
        for (label, statuses) in phase_statuses {
            let statuses: Vec<SyncStatus> = statuses
                .into_iter()
                .filter(|s| requested.contains(s))
                .collect();
            if statuses.is_empty() {
                continue;
            }
            let phase = self
                .run_phase(label, &statuses, &order_ids, &store_ids, request, &mut report)
                .await?;
            report.phases.push(phase);
        }

        Ok(report)
    }

    fn validate_order_ids(&self, order_ids: &[i64]) -> SyncResult<Vec<i64>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let valid: Vec<i64> = order_ids.iter().copied().filter(|id| *id > 0).collect();
        if valid.is_empty() {
            return Err(SyncError::NoValidOrderIds);
        }
        Ok(valid)
    }

    fn validate_store_ids(&self, request: &SyncOrdersRequest) -> SyncResult<Vec<i64>> {
        if request.ignore_sync_enabled {
            return Ok(request.store_ids.clone());
        }
        if request.store_ids.is_empty() {
            // An empty filter means "all stores"; that still needs at least
            // one store with sync enabled.
            let any_enabled = self
                .ctx
                .config
                .integrated_stores()
                .into_iter()
                .any(|store_id| self.ctx.config.sync_enabled(store_id));
            if !any_enabled {
                return Err(SyncError::NoStoresEnabled);
            }
            return Ok(Vec::new());
        }
        let enabled: Vec<i64> = request
            .store_ids
            .iter()
            .copied()
            .filter(|store_id| self.ctx.config.sync_enabled(*store_id))
            .collect();
        if enabled.is_empty() {
            return Err(SyncError::NoStoresEnabled);
        }
        Ok(enabled)
    }

    async fn run_phase(
        &self,
        label: &'static str,
        statuses: &[SyncStatus],
        order_ids: &[i64],
        store_ids: &[i64],
        request: &SyncOrdersRequest,
        report: &mut SyncOrdersReport,
    ) -> SyncResult<PhaseReport> {
        tracing::info!(phase = label, "starting sync phase");

        let mut phase = PhaseReport {
            label,
            batches: 0,
            dispatches: 0,
            synced: 0,
            failed: 0,
            stuck: false,
        };
        let mut previous_ids: Option<Vec<i64>> = None;

        for _ in 0..MAX_PHASE_ITERATIONS {
            let query = SyncOrderQuery {
                order_ids: order_ids.to_vec(),
                store_ids: store_ids.to_vec(),
                statuses: statuses.to_vec(),
                page_size: None,
            };
            let selected = self.ctx.sync_orders.list(&query).await?;
            phase.batches += 1;

            if selected.is_empty() {
                tracing::info!(phase = label, "No Action");
                break;
            }

            let selected_ids: Vec<i64> = selected.iter().map(|r| r.order_id).collect();
            if previous_ids.as_ref() == Some(&selected_ids) {
                tracing::warn!(
                    phase = label,
                    order_ids = ?selected_ids,
                    "selection did not advance; stopping phase to avoid a stuck loop"
                );
                phase.stuck = true;
                break;
            }

            // Stores without the sync flag only reach here through explicit
            // store filters or the override; the remaining rows are dropped.
            let actionable: Vec<SyncOrderRecord> = selected
                .iter()
                .filter(|r| {
                    request.ignore_sync_enabled
                        || !store_ids.is_empty()
                        || self.ctx.config.sync_enabled(r.store_id)
                })
                .cloned()
                .collect();
            if actionable.is_empty() {
                tracing::info!(phase = label, "No Action");
                break;
            }

            let batch_size = request.batch_size.max(1) as usize;
            for chunk in actionable.chunks(batch_size) {
                phase.dispatches += 1;
                self.dispatch_chunk(chunk, request, &mut phase, report).await;
            }

            previous_ids = Some(selected_ids);
        }

        tracing::info!(
            phase = label,
            batches = phase.batches,
            synced = phase.synced,
            failed = phase.failed,
            "sync phase finished"
        );
        Ok(phase)
    }

    async fn dispatch_chunk(
        &self,
        chunk: &[SyncOrderRecord],
        request: &SyncOrdersRequest,
        phase: &mut PhaseReport,
        report: &mut SyncOrdersReport,
    ) {
        let verdicts: HashMap<i64, Verdict> =
            match self.transport.execute(chunk, &request.via).await {
                Ok(outcome) => outcome
                    .items
                    .into_iter()
                    .map(|item| (item.order_id, item.verdict))
                    .collect(),
                Err(e) => {
                    tracing::warn!(
                        orders = chunk.len(),
                        "transport dispatch failed, requeueing whole batch: {e}"
                    );
                    HashMap::new()
                }
            };

        for record in chunk {
            // An order the transport did not report on counts as failed so
            // it cannot be stranded.
            let verdict = verdicts
                .get(&record.order_id)
                .copied()
                .unwrap_or(Verdict::Fail);
            match verdict {
                Verdict::Success => {
                    let result = MarkOrderAsProcessed::new(record.order_id, SyncStatus::Synced)
                        .via(request.via.clone())
                        .execute(&self.ctx)
                        .await;
                    match result {
                        Ok(result) if result.success => {
                            phase.synced += 1;
                            report
                                .lines
                                .push(format!("Order id #{}: SYNCED", record.order_id));
                        }
                        Ok(result) => {
                            phase.failed += 1;
                            report.lines.push(format!(
                                "Order id #{}: ERROR {}",
                                record.order_id,
                                result.messages.join("; ")
                            ));
                        }
                        Err(e) => {
                            phase.failed += 1;
                            report
                                .lines
                                .push(format!("Order id #{}: ERROR {e}", record.order_id));
                        }
                    }
                }
                Verdict::Error | Verdict::Fail => {
                    phase.failed += 1;
                    let order = OrderRef {
                        id: record.order_id,
                        store_id: record.store_id,
                        increment_id: String::new(),
                    };
                    let result = ProcessFailedOrderSync::new(order)
                        .via(request.via.clone())
                        .execute(&self.ctx)
                        .await;
                    match result {
                        Ok(result) => {
                            let status = result
                                .record
                                .map(|r| r.status.as_str())
                                .unwrap_or("unknown");
                            report.lines.push(format!(
                                "Order id #{}: {}",
                                record.order_id,
                                status.to_uppercase()
                            ));
                        }
                        Err(e) => {
                            report
                                .lines
                                .push(format!("Order id #{}: ERROR {e}", record.order_id));
                        }
                    }
                }
            }
        }
    }
}
