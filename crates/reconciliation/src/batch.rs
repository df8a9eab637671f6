use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wareflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use wareflow_events::Event;
use wareflow_locations::{BinId, WarehouseId};
use wareflow_products::ProductId;

use crate::reason::ReasonCode;

/// Reconciliation batch identifier (tenant-scoped via `tenant_id` fields in
/// events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub AggregateId);

impl BatchId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Batch kind. Adjustments are hand-entered corrections; cycle counts are
/// scheduled physical counts over a bin/product scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Adjustment,
    CycleCount,
}

/// Batch status lifecycle. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Created,
    Approved,
    Rejected,
}

/// One proposed correction.
///
/// `system_quantity` is the ledger availability snapshotted at proposal time.
/// It exists for display and variance reporting only; approval re-reads the
/// ledger and recomputes its deltas against the then-current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationLine {
    pub product_id: ProductId,
    pub bin_id: BinId,
    pub system_quantity: i64,
    pub proposed_quantity: i64,
    pub reason_code: Option<ReasonCode>,
    pub notes: Option<String>,
}

impl ReconciliationLine {
    /// Proposal-time variance (proposed minus snapshot).
    pub fn variance(&self) -> i64 {
        self.proposed_quantity - self.system_quantity
    }
}

/// Aggregate root: ReconciliationBatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationBatch {
    id: BatchId,
    tenant_id: Option<TenantId>,
    warehouse_id: Option<WarehouseId>,
    kind: BatchKind,
    status: BatchStatus,
    sequence_no: String,
    lines: Vec<ReconciliationLine>,
    notes: Option<String>,
    scheduled_for: Option<DateTime<Utc>>,
    created_by: Option<UserId>,
    version: u64,
    created: bool,
}

impl ReconciliationBatch {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: BatchId) -> Self {
        Self {
            id,
            tenant_id: None,
            warehouse_id: None,
            kind: BatchKind::Adjustment,
            status: BatchStatus::Created,
            sequence_no: String::new(),
            lines: Vec::new(),
            notes: None,
            scheduled_for: None,
            created_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BatchId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn sequence_no(&self) -> &str {
        &self.sequence_no
    }

    pub fn lines(&self) -> &[ReconciliationLine] {
        &self.lines
    }

    pub fn scheduled_for(&self) -> Option<DateTime<Utc>> {
        self.scheduled_for
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for ReconciliationBatch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateBatch (covers both adjustments and cycle counts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatch {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub warehouse_id: WarehouseId,
    pub kind: BatchKind,
    pub sequence_no: String,
    pub lines: Vec<ReconciliationLine>,
    pub notes: Option<String>,
    /// Cycle counts only: when the physical count is scheduled to happen.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveBatch.
///
/// `applied_deltas` carries the deltas the approver recomputed from a fresh
/// ledger read so the event records exactly what was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveBatch {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub applied_deltas: Vec<(ProductId, BinId, i64)>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectBatch {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationBatchCommand {
    CreateBatch(CreateBatch),
    ApproveBatch(ApproveBatch),
    RejectBatch(RejectBatch),
}

/// Event: BatchCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCreated {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub warehouse_id: WarehouseId,
    pub kind: BatchKind,
    pub sequence_no: String,
    pub lines: Vec<ReconciliationLine>,
    pub notes: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchApproved {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub applied_deltas: Vec<(ProductId, BinId, i64)>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRejected {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationBatchEvent {
    BatchCreated(BatchCreated),
    BatchApproved(BatchApproved),
    BatchRejected(BatchRejected),
}

impl Event for ReconciliationBatchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReconciliationBatchEvent::BatchCreated(_) => "reconciliation.batch.created",
            ReconciliationBatchEvent::BatchApproved(_) => "reconciliation.batch.approved",
            ReconciliationBatchEvent::BatchRejected(_) => "reconciliation.batch.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReconciliationBatchEvent::BatchCreated(e) => e.occurred_at,
            ReconciliationBatchEvent::BatchApproved(e) => e.occurred_at,
            ReconciliationBatchEvent::BatchRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ReconciliationBatch {
    type Command = ReconciliationBatchCommand;
    type Event = ReconciliationBatchEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReconciliationBatchEvent::BatchCreated(e) => {
                self.id = e.batch_id;
                self.tenant_id = Some(e.tenant_id);
                self.warehouse_id = Some(e.warehouse_id);
                self.kind = e.kind;
                self.status = BatchStatus::Created;
                self.sequence_no = e.sequence_no.clone();
                self.lines = e.lines.clone();
                self.notes = e.notes.clone();
                self.scheduled_for = e.scheduled_for;
                self.created_by = Some(e.created_by);
                self.created = true;
            }
            ReconciliationBatchEvent::BatchApproved(_) => {
                self.status = BatchStatus::Approved;
            }
            ReconciliationBatchEvent::BatchRejected(_) => {
                self.status = BatchStatus::Rejected;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReconciliationBatchCommand::CreateBatch(cmd) => self.handle_create(cmd),
            ReconciliationBatchCommand::ApproveBatch(cmd) => self.handle_approve(cmd),
            ReconciliationBatchCommand::RejectBatch(cmd) => self.handle_reject(cmd),
        }
    }
}

impl ReconciliationBatch {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_batch_id(&self, batch_id: BatchId) -> Result<(), DomainError> {
        if self.id != batch_id {
            return Err(DomainError::invariant("batch_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreateBatch,
    ) -> Result<Vec<ReconciliationBatchEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("reconciliation batch already exists"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "reconciliation batch requires at least one line",
            ));
        }

        if cmd.scheduled_for.is_some() && cmd.kind != BatchKind::CycleCount {
            return Err(DomainError::validation(
                "scheduled date is only valid for cycle counts",
            ));
        }

        let mut seen: HashSet<(ProductId, BinId)> = HashSet::new();
        for (index, line) in cmd.lines.iter().enumerate() {
            if line.proposed_quantity < 0 {
                return Err(DomainError::validation(format!(
                    "line {index}: proposed quantity must not be negative"
                )));
            }

            if !seen.insert((line.product_id, line.bin_id)) {
                return Err(DomainError::validation(format!(
                    "line {index}: duplicate (product, bin) pair within batch"
                )));
            }

            let variance = line.variance();
            match line.reason_code {
                None if variance != 0 => {
                    return Err(DomainError::validation(format!(
                        "line {index}: reason code required for non-zero variance"
                    )));
                }
                Some(code) if !code.allows_variance(variance) => {
                    return Err(DomainError::validation(format!(
                        "line {index}: reason code not legal for variance {variance}"
                    )));
                }
                _ => {}
            }
        }

        Ok(vec![ReconciliationBatchEvent::BatchCreated(BatchCreated {
            tenant_id: cmd.tenant_id,
            batch_id: cmd.batch_id,
            warehouse_id: cmd.warehouse_id,
            kind: cmd.kind,
            sequence_no: cmd.sequence_no.clone(),
            lines: cmd.lines.clone(),
            notes: cmd.notes.clone(),
            scheduled_for: cmd.scheduled_for,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(
        &self,
        cmd: &ApproveBatch,
    ) -> Result<Vec<ReconciliationBatchEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_batch_id(cmd.batch_id)?;

        if self.status != BatchStatus::Created {
            return Err(DomainError::invalid_state(
                "only batches in created state can be approved",
            ));
        }

        Ok(vec![ReconciliationBatchEvent::BatchApproved(
            BatchApproved {
                tenant_id: cmd.tenant_id,
                batch_id: cmd.batch_id,
                applied_deltas: cmd.applied_deltas.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_reject(
        &self,
        cmd: &RejectBatch,
    ) -> Result<Vec<ReconciliationBatchEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_batch_id(cmd.batch_id)?;

        if self.status != BatchStatus::Created {
            return Err(DomainError::invalid_state(
                "only batches in created state can be rejected",
            ));
        }

        Ok(vec![ReconciliationBatchEvent::BatchRejected(
            BatchRejected {
                tenant_id: cmd.tenant_id,
                batch_id: cmd.batch_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
