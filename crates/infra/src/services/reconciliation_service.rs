//! Reconciliation orchestration: batch lifecycle plus ledger application.
//!
//! Approval spans two aggregates (the batch and the warehouse's stock
//! ledger), which the event store cannot make atomic in one append. The
//! service gets both-or-neither semantics by ordering the writes and holding
//! a per-batch guard:
//!
//! 1. Under the guard, confirm the batch is still `created`.
//! 2. Apply the recomputed deltas to the ledger. On failure the batch has not
//!    been touched and stays `created`; the error goes back to the caller.
//! 3. Flip the batch to `approved`. Under the guard no other approval of the
//!    same batch can interleave, so the state check from step 1 still holds.
//!
//! Ledger-side concurrency conflicts (another batch on the same warehouse
//! committing between our fresh read and our append) are retried once with a
//! fresh recomputation before being surfaced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use wareflow_core::{AggregateId, TenantId, UserId};
use wareflow_events::{EventBus, EventEnvelope};
use wareflow_ledger::{ApplyDeltas, StockDelta, StockLedger, StockLedgerCommand, StockLedgerId};
use wareflow_locations::{BinId, WarehouseId};
use wareflow_products::ProductId;
use wareflow_reconciliation::{
    ApproveBatch, BatchId, BatchKind, BatchStatus, CreateBatch, ReasonCode, ReconciliationBatch,
    ReconciliationBatchCommand, ReconciliationLine, RejectBatch,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

pub const LEDGER_AGGREGATE_TYPE: &str = "ledger.stock";
pub const BATCH_AGGREGATE_TYPE: &str = "reconciliation.batch";

/// Caller-facing line input for batch creation. The system-quantity snapshot
/// is taken by the service, not supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBatchLine {
    pub product_id: ProductId,
    pub bin_id: BinId,
    /// Proposed quantity (adjustments) or counted quantity (cycle counts).
    pub proposed_quantity: i64,
    pub reason_code: Option<ReasonCode>,
    pub notes: Option<String>,
}

/// Bin/product scope for pre-populating cycle-count lines: every ledger
/// entry in the named bins, optionally narrowed to one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleCountScope {
    pub bin_ids: Vec<BinId>,
    pub product_id: Option<ProductId>,
}

/// Reconciliation workflow service.
pub struct ReconciliationService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    sequence: AtomicU64,
    // Per-batch approval guard; see module docs.
    locks: Mutex<HashMap<BatchId, Arc<Mutex<()>>>>,
}

impl<S, B> ReconciliationService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self {
            dispatcher,
            sequence: AtomicU64::new(1),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn batch_lock(&self, batch_id: BatchId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(batch_id).or_default().clone()
    }

    fn next_sequence_no(&self, kind: BatchKind) -> String {
        // Process-local counter, restarts from 1 with the process. The
        // sequence number is a display label only; the batch id is the
        // identifier, and a durable deployment would take this from a
        // database sequence instead.
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        match kind {
            BatchKind::Adjustment => format!("ADJ-{n:06}"),
            BatchKind::CycleCount => format!("CC-{n:06}"),
        }
    }

    /// Rehydrate the stock ledger of one warehouse (fresh, read-after-write
    /// consistent view).
    pub fn load_ledger(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
    ) -> Result<StockLedger, DispatchError> {
        let ledger_id = StockLedgerId::for_warehouse(warehouse_id);
        self.dispatcher
            .load(tenant_id, ledger_id.0, |_, _| StockLedger::empty(ledger_id))
    }

    /// Rehydrate one batch.
    pub fn load_batch(
        &self,
        tenant_id: TenantId,
        batch_id: BatchId,
    ) -> Result<ReconciliationBatch, DispatchError> {
        let batch = self
            .dispatcher
            .load(tenant_id, batch_id.0, |_, _| {
                ReconciliationBatch::empty(batch_id)
            })?;
        if !batch.exists() {
            return Err(DispatchError::NotFound);
        }
        Ok(batch)
    }

    /// Apply a delta batch directly to a warehouse's ledger (putaway
    /// write-back path, outside any reconciliation batch).
    pub fn apply_deltas(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        deltas: Vec<StockDelta>,
    ) -> Result<(), DispatchError> {
        let ledger_id = StockLedgerId::for_warehouse(warehouse_id);
        let cmd = StockLedgerCommand::ApplyDeltas(ApplyDeltas {
            tenant_id,
            warehouse_id,
            deltas,
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch::<StockLedger>(
            tenant_id,
            ledger_id.0,
            LEDGER_AGGREGATE_TYPE,
            cmd,
            |_, _| StockLedger::empty(ledger_id),
        )?;
        Ok(())
    }

    /// Create a batch (adjustment or cycle count) in `created` state.
    ///
    /// Snapshots each line's current availability from a fresh ledger read;
    /// validation (non-negative proposal, reason legality, per-pair
    /// uniqueness) happens in the aggregate.
    pub fn create_batch(
        &self,
        tenant_id: TenantId,
        created_by: UserId,
        warehouse_id: WarehouseId,
        kind: BatchKind,
        lines: Vec<NewBatchLine>,
        notes: Option<String>,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<BatchId, DispatchError> {
        let ledger = self.load_ledger(tenant_id, warehouse_id)?;

        let lines = lines
            .into_iter()
            .map(|l| ReconciliationLine {
                product_id: l.product_id,
                bin_id: l.bin_id,
                system_quantity: ledger.available(l.product_id, l.bin_id),
                proposed_quantity: l.proposed_quantity,
                reason_code: l.reason_code,
                notes: l.notes,
            })
            .collect();

        let batch_id = BatchId::new(AggregateId::new());
        let cmd = ReconciliationBatchCommand::CreateBatch(CreateBatch {
            tenant_id,
            batch_id,
            warehouse_id,
            kind,
            sequence_no: self.next_sequence_no(kind),
            lines,
            notes,
            scheduled_for,
            created_by,
            occurred_at: Utc::now(),
        });

        self.dispatcher.dispatch::<ReconciliationBatch>(
            tenant_id,
            batch_id.0,
            BATCH_AGGREGATE_TYPE,
            cmd,
            |_, _| ReconciliationBatch::empty(batch_id),
        )?;

        info!(batch_id = %batch_id, ?kind, "reconciliation batch created");
        Ok(batch_id)
    }

    /// Create a cycle-count batch, pre-populating lines from a bin/product
    /// scope. Scope-derived lines default the counted quantity to the
    /// current snapshot (zero variance until the counter edits them);
    /// hand-entered lines win over the scope for the same (product, bin)
    /// pair, and duplicate pairs are skipped rather than rejected.
    pub fn create_cycle_count(
        &self,
        tenant_id: TenantId,
        created_by: UserId,
        warehouse_id: WarehouseId,
        scope: Option<CycleCountScope>,
        lines: Vec<NewBatchLine>,
        notes: Option<String>,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<BatchId, DispatchError> {
        let mut lines = lines;

        if let Some(scope) = scope {
            let ledger = self.load_ledger(tenant_id, warehouse_id)?;
            let mut seen: Vec<(ProductId, BinId)> = lines
                .iter()
                .map(|l| (l.product_id, l.bin_id))
                .collect();

            for (&(product_id, bin_id), entry) in ledger.entries() {
                if !scope.bin_ids.contains(&bin_id) {
                    continue;
                }
                if scope.product_id.is_some_and(|p| p != product_id) {
                    continue;
                }
                if seen.contains(&(product_id, bin_id)) {
                    continue;
                }
                seen.push((product_id, bin_id));
                lines.push(NewBatchLine {
                    product_id,
                    bin_id,
                    proposed_quantity: entry.available,
                    reason_code: None,
                    notes: None,
                });
            }
        }

        self.create_batch(
            tenant_id,
            created_by,
            warehouse_id,
            BatchKind::CycleCount,
            lines,
            notes,
            scheduled_for,
        )
    }

    /// Approve a batch: recompute deltas from a fresh ledger read, apply them
    /// atomically, then flip the batch status.
    pub fn approve_batch(&self, tenant_id: TenantId, batch_id: BatchId) -> Result<(), DispatchError> {
        let lock = self.batch_lock(batch_id);
        let _guard: MutexGuard<'_, ()> = lock.lock().unwrap_or_else(|e| e.into_inner());

        let batch = self.load_batch(tenant_id, batch_id)?;
        if batch.status() != BatchStatus::Created {
            return Err(DispatchError::InvalidState(
                "only batches in created state can be approved".to_string(),
            ));
        }
        let warehouse_id = batch
            .warehouse_id()
            .ok_or_else(|| DispatchError::InvariantViolation("batch has no warehouse".to_string()))?;

        // Ledger write with one automatic retry on a lost race.
        let applied = match self.apply_batch_deltas(tenant_id, warehouse_id, &batch) {
            Ok(applied) => applied,
            Err(e) if e.is_retryable() => {
                warn!(batch_id = %batch_id, "ledger apply lost a race, retrying with fresh read");
                self.apply_batch_deltas(tenant_id, warehouse_id, &batch)?
            }
            Err(e) => return Err(e),
        };

        // Ledger applied; flip the batch. Under the per-batch guard the state
        // check above still holds, so this append can only fail on
        // infrastructure errors.
        let cmd = ReconciliationBatchCommand::ApproveBatch(ApproveBatch {
            tenant_id,
            batch_id,
            applied_deltas: applied
                .iter()
                .map(|d| (d.product_id, d.bin_id, d.quantity_change))
                .collect(),
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch::<ReconciliationBatch>(
            tenant_id,
            batch_id.0,
            BATCH_AGGREGATE_TYPE,
            cmd,
            |_, _| ReconciliationBatch::empty(batch_id),
        )?;

        info!(batch_id = %batch_id, lines = applied.len(), "reconciliation batch approved");
        Ok(())
    }

    /// Reject a batch; no ledger interaction.
    pub fn reject_batch(&self, tenant_id: TenantId, batch_id: BatchId) -> Result<(), DispatchError> {
        let lock = self.batch_lock(batch_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let cmd = ReconciliationBatchCommand::RejectBatch(RejectBatch {
            tenant_id,
            batch_id,
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch::<ReconciliationBatch>(
            tenant_id,
            batch_id.0,
            BATCH_AGGREGATE_TYPE,
            cmd,
            |_, _| ReconciliationBatch::empty(batch_id),
        )?;

        info!(batch_id = %batch_id, "reconciliation batch rejected");
        Ok(())
    }

    /// Recompute each line's delta against the current ledger state and apply
    /// the batch as one atomic unit. Returns the non-zero deltas applied.
    fn apply_batch_deltas(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        batch: &ReconciliationBatch,
    ) -> Result<Vec<StockDelta>, DispatchError> {
        let ledger = self.load_ledger(tenant_id, warehouse_id)?;

        // Fresh-read recomputation: the creation-time snapshot is display
        // only; stock may have moved since proposal.
        let deltas: Vec<StockDelta> = batch
            .lines()
            .iter()
            .map(|line| StockDelta {
                product_id: line.product_id,
                bin_id: line.bin_id,
                quantity_change: line.proposed_quantity
                    - ledger.available(line.product_id, line.bin_id),
            })
            .filter(|d| d.quantity_change != 0)
            .collect();

        if deltas.is_empty() {
            return Ok(vec![]);
        }

        let ledger_id = StockLedgerId::for_warehouse(warehouse_id);
        let cmd = StockLedgerCommand::ApplyDeltas(ApplyDeltas {
            tenant_id,
            warehouse_id,
            deltas: deltas.clone(),
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch::<StockLedger>(
            tenant_id,
            ledger_id.0,
            LEDGER_AGGREGATE_TYPE,
            cmd,
            |_, _| StockLedger::empty(ledger_id),
        )?;

        Ok(deltas)
    }
}
