use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use wareflow_core::{AggregateId, TenantId, UserId};
use wareflow_events::EventEnvelope;
use wareflow_ledger::StockDelta;
use wareflow_locations::WarehouseId;
use wareflow_reconciliation::{
    BatchId, BatchKind, BatchStatus, ReconciliationBatchEvent, ReconciliationLine,
};

use crate::read_model::TenantStore;

/// Queryable reconciliation batch read model (batch with lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReadModel {
    pub batch_id: BatchId,
    pub warehouse_id: WarehouseId,
    pub kind: BatchKind,
    pub status: BatchStatus,
    /// Display label, not an identifier; assigned per-process at creation.
    pub sequence_no: String,
    pub lines: Vec<ReconciliationLine>,
    pub notes: Option<String>,
    /// Cycle counts only: when the physical count is scheduled.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    /// Deltas actually applied at approval (fresh-read recomputation), if approved.
    pub applied_deltas: Vec<StockDelta>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum BatchProjectionError {
    #[error("failed to deserialize batch event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("batch event for unknown batch {0}")]
    UnknownBatch(BatchId),
}

/// Reconciliation batches projection.
#[derive(Debug)]
pub struct BatchesProjection<S>
where
    S: TenantStore<BatchId, BatchReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> BatchesProjection<S>
where
    S: TenantStore<BatchId, BatchReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, tenant_id: TenantId, batch_id: &BatchId) -> Option<BatchReadModel> {
        self.store.get(tenant_id, batch_id)
    }

    /// List all batches for a tenant, newest first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<BatchReadModel> {
        let mut batches = self.store.list(tenant_id);
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        batches
    }

    /// Apply a published envelope into the projection (idempotent).
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), BatchProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let key = CursorKey {
                tenant_id,
                aggregate_id,
            };
            let last = *cursors.get(&key).unwrap_or(&0);

            if seq == 0 {
                return Err(BatchProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(BatchProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let ev: ReconciliationBatchEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| BatchProjectionError::Deserialize(e.to_string()))?;

            let (event_tenant, batch_id) = match &ev {
                ReconciliationBatchEvent::BatchCreated(e) => (e.tenant_id, e.batch_id),
                ReconciliationBatchEvent::BatchApproved(e) => (e.tenant_id, e.batch_id),
                ReconciliationBatchEvent::BatchRejected(e) => (e.tenant_id, e.batch_id),
            };

            if event_tenant != tenant_id {
                return Err(BatchProjectionError::TenantIsolation(
                    "event tenant_id does not match envelope tenant_id".to_string(),
                ));
            }

            if batch_id.0 != aggregate_id {
                return Err(BatchProjectionError::TenantIsolation(
                    "event batch_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match ev {
                ReconciliationBatchEvent::BatchCreated(e) => {
                    self.store.upsert(
                        tenant_id,
                        e.batch_id,
                        BatchReadModel {
                            batch_id: e.batch_id,
                            warehouse_id: e.warehouse_id,
                            kind: e.kind,
                            status: BatchStatus::Created,
                            sequence_no: e.sequence_no,
                            lines: e.lines,
                            notes: e.notes,
                            scheduled_for: e.scheduled_for,
                            created_by: Some(e.created_by),
                            created_at: e.occurred_at,
                            applied_deltas: vec![],
                            processed_at: None,
                        },
                    );
                }
                ReconciliationBatchEvent::BatchApproved(e) => {
                    let mut rm = self
                        .store
                        .get(tenant_id, &e.batch_id)
                        .ok_or(BatchProjectionError::UnknownBatch(e.batch_id))?;
                    rm.status = BatchStatus::Approved;
                    rm.applied_deltas = e
                        .applied_deltas
                        .into_iter()
                        .map(|(product_id, bin_id, quantity_change)| StockDelta {
                            product_id,
                            bin_id,
                            quantity_change,
                        })
                        .collect();
                    rm.processed_at = Some(e.occurred_at);
                    self.store.upsert(tenant_id, e.batch_id, rm);
                }
                ReconciliationBatchEvent::BatchRejected(e) => {
                    let mut rm = self
                        .store
                        .get(tenant_id, &e.batch_id)
                        .ok_or(BatchProjectionError::UnknownBatch(e.batch_id))?;
                    rm.status = BatchStatus::Rejected;
                    rm.processed_at = Some(e.occurred_at);
                    self.store.upsert(tenant_id, e.batch_id, rm);
                }
            }

            // Advance cursor after successful apply.
            cursors.insert(key, seq);
        }

        Ok(())
    }
}
